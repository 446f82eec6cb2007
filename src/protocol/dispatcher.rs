use crate::error::constants::ERR_DISPATCHER_LOCK;
use crate::error::ApplicationError;
use crate::protocol::processor::Processor;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type HandlerFn = dyn Fn(&[u8]) -> Result<Vec<u8>, ApplicationError> + Send + Sync + 'static;

/// Routes calls to handlers by method name.
/// Uses Cow<'static, str> keys so static method names are never copied.
#[derive(Clone)]
pub struct Dispatcher {
    handlers: Arc<RwLock<HashMap<Cow<'static, str>, Box<HandlerFn>>>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn register<F>(
        &self,
        method: impl Into<Cow<'static, str>>,
        handler: F,
    ) -> Result<(), ApplicationError>
    where
        F: Fn(&[u8]) -> Result<Vec<u8>, ApplicationError> + Send + Sync + 'static,
    {
        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| ApplicationError::internal(ERR_DISPATCHER_LOCK))?;

        handlers.insert(method.into(), Box::new(handler));
        Ok(())
    }

    pub fn dispatch(&self, method: &str, args: &[u8]) -> Result<Vec<u8>, ApplicationError> {
        let handlers = self
            .handlers
            .read()
            .map_err(|_| ApplicationError::internal(ERR_DISPATCHER_LOCK))?;

        handlers
            .get(method)
            .ok_or_else(|| ApplicationError::unknown_method(method))
            .and_then(|handler| handler(args))
    }
}

impl Processor for Dispatcher {
    fn process(&self, method: &str, args: &[u8]) -> Result<Vec<u8>, ApplicationError> {
        self.dispatch(method, args)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ApplicationErrorKind;

    #[test]
    fn test_dispatch_routes_by_method() {
        let dispatcher = Dispatcher::new();
        dispatcher
            .register("upper", |args| Ok(args.to_ascii_uppercase()))
            .unwrap();
        dispatcher
            .register(String::from("len"), |args| {
                Ok(args.len().to_string().into_bytes())
            })
            .unwrap();

        assert_eq!(dispatcher.dispatch("upper", b"abc").unwrap(), b"ABC");
        assert_eq!(dispatcher.process("len", b"abcd").unwrap(), b"4");
    }

    #[test]
    fn test_unknown_method() {
        let dispatcher = Dispatcher::new();
        let err = dispatcher.dispatch("nope", b"").unwrap_err();
        assert_eq!(err.kind, ApplicationErrorKind::UnknownMethod);
    }
}
