use crate::error::ApplicationError;

/// Handles calls arriving on a server connection.
///
/// Invoked once per Call or Oneway message, sequentially for a given
/// connection. Returned bytes become the reply payload; an error becomes an
/// Exception reply. Oneway results are discarded.
pub trait Processor: Send + Sync + 'static {
    fn process(&self, method: &str, args: &[u8]) -> Result<Vec<u8>, ApplicationError>;
}

impl<F> Processor for F
where
    F: Fn(&str, &[u8]) -> Result<Vec<u8>, ApplicationError> + Send + Sync + 'static,
{
    fn process(&self, method: &str, args: &[u8]) -> Result<Vec<u8>, ApplicationError> {
        self(method, args)
    }
}
