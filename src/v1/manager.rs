use thiserror::Error;
use tracing::debug;

/// Lifecycle contract every managed resource type implements.
///
/// The five verbs map one to one onto remote calls. `ensure_present` and
/// `ensure_absent` sequence them the way a plan run needs.
pub trait ResourceManager<Input, Output>: Send + Sync {
    fn create(&self, input: &Input) -> Result<Output, ManagerError>;
    fn read(&self, id: &str) -> Result<Output, ManagerError>;
    fn update(&self, id: &str, input: &Input) -> Result<Output, ManagerError>;
    fn delete(&self, id: &str) -> Result<(), ManagerError>;
    /// `Ok(false)` only for a confirmed not-found. An `Err` means the object
    /// must be assumed to exist while the failure is reported.
    fn exists(&self, id: &str) -> Result<bool, ManagerError>;
    fn state_id(&self, output: &Output) -> String;
    fn is_in_sync(&self, output: &Output, input: &Input) -> bool;

    /// Local checks on `input`. Runs before any remote call.
    fn validate(&self, _input: &Input) -> Result<(), ManagerError> {
        Ok(())
    }
    fn requires_replace(&self, _latest: &Output, _input: &Input) -> bool {
        false
    }
    fn import(&self, id: &str) -> Result<Output, ManagerError> {
        self.read(id)
    }

    fn ensure_absent(&self, latest: &Output) -> Result<bool, ManagerError> {
        let id = self.state_id(latest);
        if self.exists(&id)? {
            self.delete(&id).map(|_| true)
        } else {
            debug!("Resource[{}] is already gone", id);
            Ok(false)
        }
    }
    fn ensure_present(&self, latest: Option<&Output>, input: &Input) -> Result<Output, ManagerError> {
        self.validate(input)?;
        let latest = match latest {
            Some(latest) => latest,
            None => return self.create(input),
        };
        let id = self.state_id(latest);
        if !self.exists(&id)? {
            debug!("Resource[{}] vanished remotely, recreating it", id);
            return self.create(input);
        }
        if self.requires_replace(latest, input) {
            debug!("Resource[{}] must be replaced", id);
            self.delete(&id)?;
            return self.create(input);
        }
        let current = self.read(&id)?;
        if self.is_in_sync(&current, input) {
            Ok(current)
        } else {
            self.update(&id, input)
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ManagerError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    CreateFail(String),
    #[error("{0}")]
    UpdateFail(String),
    #[error("{0}")]
    DeleteFail(String),
    #[error("{0}")]
    LookupFail(String),
    #[error("{0}")]
    ExistsCheckFail(String),
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        exists: Option<bool>,
        remote_value: String,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }
    }

    // Input and output are (id, value) pairs.
    impl ResourceManager<(String, String), (String, String)> for Recorder {
        fn create(&self, input: &(String, String)) -> Result<(String, String), ManagerError> {
            self.record(format!("create {}", input.0));
            Ok(input.clone())
        }
        fn read(&self, id: &str) -> Result<(String, String), ManagerError> {
            self.record(format!("read {}", id));
            Ok((id.to_string(), self.remote_value.clone()))
        }
        fn update(
            &self,
            id: &str,
            input: &(String, String),
        ) -> Result<(String, String), ManagerError> {
            self.record(format!("update {}", id));
            Ok((id.to_string(), input.1.clone()))
        }
        fn delete(&self, id: &str) -> Result<(), ManagerError> {
            self.record(format!("delete {}", id));
            Ok(())
        }
        fn exists(&self, id: &str) -> Result<bool, ManagerError> {
            self.record(format!("exists {}", id));
            self.exists
                .ok_or_else(|| ManagerError::ExistsCheckFail("boom".to_string()))
        }
        fn state_id(&self, output: &(String, String)) -> String {
            output.0.clone()
        }
        fn is_in_sync(&self, output: &(String, String), input: &(String, String)) -> bool {
            output.1 == input.1
        }
        fn validate(&self, input: &(String, String)) -> Result<(), ManagerError> {
            match input.1.as_str() {
                "invalid" => Err(ManagerError::Validation("invalid value".to_string())),
                _ => Ok(()),
            }
        }
        fn requires_replace(&self, latest: &(String, String), input: &(String, String)) -> bool {
            latest.0 != input.0
        }
    }

    fn pair(id: &str, value: &str) -> (String, String) {
        (id.to_string(), value.to_string())
    }

    #[test]
    fn creates_without_prior_state() {
        let mngr = Recorder::default();
        let output = mngr.ensure_present(None, &pair("a", "x")).unwrap();
        assert_eq!(output, pair("a", "x"));
        assert_eq!(mngr.calls(), vec!["create a"]);
    }

    #[test]
    fn recreates_when_remote_object_is_gone() {
        let mngr = Recorder {
            exists: Some(false),
            ..Default::default()
        };
        mngr.ensure_present(Some(&pair("a", "x")), &pair("a", "x"))
            .unwrap();
        assert_eq!(mngr.calls(), vec!["exists a", "create a"]);
    }

    #[test]
    fn skips_update_when_in_sync() {
        let mngr = Recorder {
            exists: Some(true),
            remote_value: "x".to_string(),
            ..Default::default()
        };
        mngr.ensure_present(Some(&pair("a", "x")), &pair("a", "x"))
            .unwrap();
        assert_eq!(mngr.calls(), vec!["exists a", "read a"]);
    }

    #[test]
    fn updates_on_drift_and_keeps_id() {
        let mngr = Recorder {
            exists: Some(true),
            remote_value: "old".to_string(),
            ..Default::default()
        };
        let output = mngr
            .ensure_present(Some(&pair("a", "old")), &pair("a", "new"))
            .unwrap();
        assert_eq!(output, pair("a", "new"));
        assert_eq!(mngr.calls(), vec!["exists a", "read a", "update a"]);
    }

    #[test]
    fn replaces_when_identifier_changes() {
        let mngr = Recorder {
            exists: Some(true),
            ..Default::default()
        };
        mngr.ensure_present(Some(&pair("a", "x")), &pair("b", "x"))
            .unwrap();
        assert_eq!(mngr.calls(), vec!["exists a", "delete a", "create b"]);
    }

    #[test]
    fn invalid_input_is_rejected_before_any_call() {
        let mngr = Recorder {
            exists: Some(true),
            ..Default::default()
        };
        let err = mngr
            .ensure_present(None, &pair("a", "invalid"))
            .unwrap_err();
        assert!(matches!(err, ManagerError::Validation(_)));
        // A replacement must not delete the old object for an input that
        // cannot be created.
        assert!(mngr
            .ensure_present(Some(&pair("a", "x")), &pair("b", "invalid"))
            .is_err());
        assert!(mngr.calls().is_empty(), "{:?}", mngr.calls());
    }

    #[test]
    fn exists_failure_aborts_both_directions() {
        let mngr = Recorder::default();
        assert!(mngr
            .ensure_present(Some(&pair("a", "x")), &pair("a", "x"))
            .is_err());
        assert!(mngr.ensure_absent(&pair("a", "x")).is_err());
        assert_eq!(mngr.calls(), vec!["exists a", "exists a"]);
    }

    #[test]
    fn ensure_absent_deletes_only_existing_objects() {
        let gone = Recorder {
            exists: Some(false),
            ..Default::default()
        };
        assert!(!gone.ensure_absent(&pair("a", "x")).unwrap());
        assert_eq!(gone.calls(), vec!["exists a"]);

        let present = Recorder {
            exists: Some(true),
            ..Default::default()
        };
        assert!(present.ensure_absent(&pair("a", "x")).unwrap());
        assert_eq!(present.calls(), vec!["exists a", "delete a"]);
    }
}
