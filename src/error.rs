use easy_ext::ext;
use thiserror::Error;

/// Failures raised by the simplifier and its meta layer.
///
/// Everything is carried through `anyhow::Result`; this type is what gets downcast when
/// a caller needs to tell a recoverable failure apart from a runtime-fatal one.
#[derive(Debug, Clone, Error)]
pub enum Exception {
    #[error("{0}")]
    Error(String),
    #[error("maximum recursion depth has been reached")]
    MaxRecDepth,
    #[error("simp failed, maximum number of steps exceeded ({0})")]
    MaxSteps(usize),
    #[error("interrupted")]
    Interrupted,
}

impl Exception {
    /// Runtime-fatal exceptions propagate through every recovery point unless the caller
    /// explicitly opted into catching them.
    pub fn is_runtime(&self) -> bool {
        matches!(
            self,
            Exception::MaxRecDepth | Exception::MaxSteps(_) | Exception::Interrupted
        )
    }
}

pub fn is_runtime_exception(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Exception>()
        .is_some_and(Exception::is_runtime)
}

#[ext(RecoverExt)]
pub impl<T> anyhow::Result<Option<T>> {
    /// Turns a recoverable failure into "no result". Runtime exceptions keep propagating
    /// unless `catch_runtime` is set.
    fn or_recover(self, catch_runtime: bool) -> anyhow::Result<Option<T>> {
        match self {
            Ok(r) => Ok(r),
            Err(err) if catch_runtime || !is_runtime_exception(&err) => {
                log::trace!(target: "simp::recover", "recovered from: {err}");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::*;

    fn fail(e: Exception) -> anyhow::Result<Option<u32>> {
        bail!(e)
    }

    #[test]
    fn recover_policy() {
        assert!(fail(Exception::Error("x".into())).or_recover(false).unwrap().is_none());
        assert!(fail(Exception::MaxRecDepth).or_recover(false).is_err());
        assert!(fail(Exception::MaxSteps(3)).or_recover(true).unwrap().is_none());
        let plain: anyhow::Result<Option<u32>> = Err(anyhow::anyhow!("unification failed"));
        assert!(plain.or_recover(false).unwrap().is_none());
        assert_eq!(Ok::<_, anyhow::Error>(Some(1)).or_recover(false).unwrap(), Some(1));
    }
}
