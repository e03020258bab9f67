//! Read-only safety check for raw kubectl pass-through commands

/// Verbs that never mutate cluster state
pub const ALLOWED_VERBS: &[&str] = &["get", "describe", "logs", "top"];

/// Flags that can exfiltrate data or smuggle in mutations
pub const FORBIDDEN_FLAGS: &[&str] = &["-o jsonpath", "-o=jsonpath", "--dry-run", "--overrides"];

const SHELL_OPERATORS: &[char] = &[';', '|', '>', '&'];

/// Validate a kubectl command line, with or without the leading `kubectl`.
///
/// Returns the reason for rejection as the error value.
pub fn validate_kubectl_command(command: &str) -> Result<(), String> {
    let mut parts: Vec<&str> = command.split_whitespace().collect();
    if parts.first() == Some(&"kubectl") {
        parts.remove(0);
    }

    let verb = match parts.first() {
        Some(verb) => *verb,
        None => return Err("Empty command".to_string()),
    };

    if !ALLOWED_VERBS.contains(&verb) {
        return Err(format!(
            "Command '{}' is not allowed. Only read-only commands are permitted.",
            verb
        ));
    }

    if command.contains(SHELL_OPERATORS) {
        return Err("Shell operators are not allowed.".to_string());
    }

    let normalized = parts.join(" ");
    for flag in FORBIDDEN_FLAGS {
        let hit = if flag.contains(' ') {
            normalized.contains(flag)
        } else {
            parts.iter().any(|p| p.starts_with(flag))
        };
        if hit {
            return Err(format!("Flag '{}' is not allowed.", flag));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_only_verbs_allowed() {
        for cmd in [
            "get pods -n default",
            "describe pod web-1",
            "logs web-1 --tail=50",
            "top nodes",
            "kubectl get deployments -A",
        ] {
            assert_eq!(validate_kubectl_command(cmd), Ok(()), "{}", cmd);
        }
    }

    #[test]
    fn test_mutating_verbs_rejected() {
        let err = validate_kubectl_command("delete pod web-1").unwrap_err();
        assert!(err.contains("'delete' is not allowed"));
        assert!(validate_kubectl_command("kubectl apply -f x.yaml").is_err());
    }

    #[test]
    fn test_empty_command_rejected() {
        assert_eq!(validate_kubectl_command("   "), Err("Empty command".to_string()));
        assert_eq!(validate_kubectl_command("kubectl"), Err("Empty command".to_string()));
    }

    #[test]
    fn test_shell_operators_rejected() {
        for cmd in [
            "get pods; rm -rf /",
            "get pods | grep web",
            "get pods > out.txt",
            "get pods && echo hi",
        ] {
            assert_eq!(
                validate_kubectl_command(cmd),
                Err("Shell operators are not allowed.".to_string()),
                "{}",
                cmd
            );
        }
    }

    #[test]
    fn test_forbidden_flags_rejected() {
        for (cmd, flag) in [
            ("get secrets -o jsonpath={.data}", "-o jsonpath"),
            ("get secrets -o=jsonpath={.data}", "-o=jsonpath"),
            ("get pods --dry-run=client", "--dry-run"),
            ("get pods --overrides {}", "--overrides"),
        ] {
            let err = validate_kubectl_command(cmd).unwrap_err();
            assert!(err.contains(flag), "{} -> {}", cmd, err);
        }
    }
}
