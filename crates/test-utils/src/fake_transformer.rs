use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use revbuild::errors::{Result, RevbuildError};
use revbuild::fs::{mirror_dir, Equality};
use revbuild::pipeline::{TransformInput, Transformer, TransformerExit};
use revbuild::types::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    /// Copy the snapshot tree into the output and exit 0.
    Copy,
    /// Copy, then report the given exit code.
    CopyThenExit(i32),
    /// Fail as if the program could not be started.
    CannotStart,
}

/// Transformer that copies the snapshot verbatim, without a subprocess.
#[derive(Debug, Clone)]
pub struct CopyTransformer {
    behaviour: Arc<Mutex<Behaviour>>,
    runs: Arc<Mutex<Vec<Version>>>,
}

impl CopyTransformer {
    pub fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour: Arc::new(Mutex::new(behaviour)),
            runs: Arc::default(),
        }
    }

    pub fn set_behaviour(&self, behaviour: Behaviour) {
        *self.behaviour.lock().unwrap() = behaviour;
    }

    /// Versions transformed so far.
    pub fn runs(&self) -> Vec<Version> {
        self.runs.lock().unwrap().clone()
    }
}

impl Transformer for CopyTransformer {
    fn transform(
        &self,
        input: TransformInput,
    ) -> Pin<Box<dyn Future<Output = Result<TransformerExit>> + Send + '_>> {
        let behaviour = *self.behaviour.lock().unwrap();
        self.runs.lock().unwrap().push(input.version);

        Box::pin(async move {
            if behaviour == Behaviour::CannotStart {
                return Err(RevbuildError::TransformerInvocationError(
                    "scripted spawn failure".to_string(),
                ));
            }

            mirror_dir(&input.snapshot_dir, &input.output_dir, Equality::Contents)?;

            Ok(match behaviour {
                Behaviour::CopyThenExit(code) => TransformerExit {
                    code: Some(code),
                    success: code == 0,
                },
                _ => TransformerExit {
                    code: Some(0),
                    success: true,
                },
            })
        })
    }
}
