//! Reports for errors nobody handled.
//!
//! Both uncaught task errors and unobserved rejections reach the host through
//! a single sink; [`UnhandledKind`] and [`TaskOrigin`] tell them apart.

use crate::task_queue::TimerToken;
use core_types::JsError;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Which kind of unhandled error is being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnhandledKind {
    /// A future was rejected and no reaction was ever registered on it.
    Rejection,
    /// A task body returned an error or panicked.
    Exception,
}

impl fmt::Display for UnhandledKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnhandledKind::Rejection => write!(f, "rejection"),
            UnhandledKind::Exception => write!(f, "exception"),
        }
    }
}

/// Where an unhandled error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum TaskOrigin {
    /// A microtask, by queue sequence number.
    Microtask {
        /// Sequence number assigned on enqueue
        seq: u64,
    },
    /// A macrotask, by its timer token.
    Macrotask {
        /// Token returned when the macrotask was scheduled
        token: TimerToken,
    },
    /// A future, by id.
    Future {
        /// Id of the future within its scheduler
        id: u64,
    },
}

/// An error delivered to the unhandled-error sink.
#[derive(Clone, Serialize)]
pub struct UnhandledError {
    /// Rejection or exception
    pub kind: UnhandledKind,
    /// The task or future that produced it
    pub origin: TaskOrigin,
    /// `Debug` rendering of the payload
    pub description: String,
    /// The original error value; downcast with [`UnhandledError::payload`]
    #[serde(skip)]
    pub payload: Rc<dyn Any>,
}

impl UnhandledError {
    pub(crate) fn rejection<E>(future_id: u64, error: E) -> Self
    where
        E: fmt::Debug + 'static,
    {
        Self {
            kind: UnhandledKind::Rejection,
            origin: TaskOrigin::Future { id: future_id },
            description: format!("{:?}", error),
            payload: Rc::new(error),
        }
    }

    pub(crate) fn exception(origin: TaskOrigin, error: JsError) -> Self {
        Self {
            kind: UnhandledKind::Exception,
            origin,
            description: error.to_string(),
            payload: Rc::new(error),
        }
    }

    pub(crate) fn panic(origin: TaskOrigin, panic: Box<dyn Any + Send>) -> Self {
        Self::exception(origin, panic_error(panic))
    }

    /// Returns the payload if it is a `P`.
    ///
    /// Rejections carry the future's error type; exceptions carry a
    /// [`JsError`] (panics become an `InternalError`).
    pub fn payload<P: 'static>(&self) -> Option<&P> {
        self.payload.downcast_ref::<P>()
    }
}

impl fmt::Debug for UnhandledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnhandledError")
            .field("kind", &self.kind)
            .field("origin", &self.origin)
            .field("description", &self.description)
            .finish()
    }
}

impl fmt::Display for UnhandledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unhandled {}: {}", self.kind, self.description)
    }
}

/// Converts a caught panic payload into an `InternalError`.
pub(crate) fn panic_error(panic: Box<dyn Any + Send>) -> JsError {
    let message = if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    };
    JsError::internal(message)
}

/// Host callback receiving unhandled errors.
pub type ErrorSink = Rc<dyn Fn(&UnhandledError)>;

pub(crate) fn log_unhandled(error: &UnhandledError) {
    tracing::warn!(
        kind = %error.kind,
        origin = ?error.origin,
        "unhandled {}: {}",
        error.kind,
        error.description
    );
}
