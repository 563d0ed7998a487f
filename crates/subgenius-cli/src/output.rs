//! Result and error rendering.

use serde::Serialize;
use subgenius_core::CoreError;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Stable identifier for each error kind in JSON output
fn error_kind(err: &CoreError) -> &'static str {
    match err {
        CoreError::MissingCredential => "missing_credential",
        CoreError::MediaRead(_) => "media_read",
        CoreError::Auth(_) | CoreError::AuthKeyRetained { .. } => "auth",
        CoreError::Upstream(_) => "upstream",
        CoreError::Generation(_) => "generation",
        CoreError::Timeout(_) => "timeout",
        CoreError::Cancelled => "cancelled",
        CoreError::Validation(_) => "validation",
        CoreError::Credential(_) => "credential_store",
        CoreError::IoError(_) => "io",
        CoreError::JsonError(_) => "json",
        CoreError::Internal(_) => "internal",
    }
}

/// What the user can do about an error, when there is something to do
fn hint(err: &CoreError) -> Option<&'static str> {
    match err {
        CoreError::MissingCredential => Some("Store a key with `subgenius key set`."),
        CoreError::Auth(_) => Some(
            "The stored API key was rejected and has been removed. Run `subgenius key set` with a valid key.",
        ),
        CoreError::AuthKeyRetained { .. } => Some(
            "The stored API key was rejected but could not be removed. Run `subgenius key clear`, then `subgenius key set` with a valid key.",
        ),
        CoreError::Upstream(_) if err.requires_paid_key() => Some(
            "Video generation needs an API key from a Google Cloud project with billing enabled.",
        ),
        CoreError::MediaRead(_) => Some("Check that the file exists and is readable."),
        CoreError::Timeout(_) => {
            Some("Raise --max-wait, or set polling.maxWaitSecs to 0 in settings to wait indefinitely.")
        }
        _ => None,
    }
}

/// Prints an error to stderr, or as JSON on stdout in `--json` mode
pub fn report_error(err: &anyhow::Error, json: bool) {
    let core = err.downcast_ref::<CoreError>();
    let kind = core.map(error_kind).unwrap_or("error");
    let hint = core.and_then(hint);

    if json {
        let body = serde_json::json!({
            "error": {
                "kind": kind,
                "message": format!("{:#}", err),
                "hint": hint,
            }
        });
        println!("{}", body);
        return;
    }

    eprintln!("error: {:#}", err);
    if let Some(hint) = hint {
        eprintln!("hint: {}", hint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hints_per_kind() {
        assert!(hint(&CoreError::MissingCredential)
            .unwrap()
            .contains("key set"));
        assert!(hint(&CoreError::Auth("403".to_string()))
            .unwrap()
            .contains("removed"));
        let retained = CoreError::AuthKeyRetained {
            reason: "403".to_string(),
            source: subgenius_core::core::credentials::CredentialError::EmptyValue,
        };
        assert!(hint(&retained).unwrap().contains("could not be removed"));
        assert_eq!(error_kind(&retained), "auth");
        assert!(hint(&CoreError::Upstream(
            "API error (404; status=NOT_FOUND): Requested entity was not found.".to_string()
        ))
        .unwrap()
        .contains("billing"));
        assert!(hint(&CoreError::Upstream("quota".to_string())).is_none());
        assert!(hint(&CoreError::Generation("no output produced".to_string())).is_none());
    }

    #[test]
    fn test_error_kind_labels() {
        assert_eq!(error_kind(&CoreError::MissingCredential), "missing_credential");
        assert_eq!(error_kind(&CoreError::Cancelled), "cancelled");
        assert_eq!(
            error_kind(&CoreError::Generation("x".to_string())),
            "generation"
        );
    }

    #[test]
    fn test_core_error_survives_anyhow() {
        let err: anyhow::Error = CoreError::MissingCredential.into();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::MissingCredential)
        ));
    }
}
