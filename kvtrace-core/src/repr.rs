//! Textual call serialization for call history.
//!
//! Arguments are recorded as a tuple-like text (`('foo',)`) and results as
//! their display form. The format is meant for humans reading a replay and is
//! not parsed back.

use crate::{CacheKey, OperationId, StoredValue};

/// Recorded output for an absent result.
pub const ABSENT_MARKER: &str = "None";

/// Prefix of the recorded output of a failed call.
pub const ERROR_PREFIX: &str = "!error: ";

/// Text forms of a value taking part in a recorded call.
pub trait CallRepr {
    /// Form used inside an argument tuple. Strings are quoted here.
    fn arg_repr(&self) -> String;

    /// Form recorded as the output of a call.
    fn output_repr(&self) -> String {
        self.arg_repr()
    }
}

/// Positional arguments of a call, rendered as a tuple.
pub trait CallArgs {
    fn args_repr(&self) -> String;
}

/// Recorded output for a call that returned an error.
pub fn error_repr(err: &impl std::fmt::Display) -> String {
    format!("{}{}", ERROR_PREFIX, err)
}

// ============================================================================
// QUOTING
// ============================================================================

fn quote_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn quote_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 3);
    out.push_str("b'");
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out.push('\'');
    out
}

// ============================================================================
// IMPLEMENTATIONS
// ============================================================================

impl CallRepr for str {
    fn arg_repr(&self) -> String {
        quote_str(self)
    }

    fn output_repr(&self) -> String {
        self.to_string()
    }
}

impl CallRepr for String {
    fn arg_repr(&self) -> String {
        self.as_str().arg_repr()
    }

    fn output_repr(&self) -> String {
        self.clone()
    }
}

impl CallRepr for [u8] {
    fn arg_repr(&self) -> String {
        quote_bytes(self)
    }
}

impl CallRepr for Vec<u8> {
    fn arg_repr(&self) -> String {
        quote_bytes(self)
    }
}

macro_rules! impl_call_repr_display {
    ($($t:ty),*) => {
        $(
            impl CallRepr for $t {
                fn arg_repr(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

impl_call_repr_display!(i32, i64, u32, u64, usize, bool);

impl CallRepr for f64 {
    fn arg_repr(&self) -> String {
        format!("{:?}", self)
    }
}

impl CallRepr for CacheKey {
    fn arg_repr(&self) -> String {
        quote_str(&self.to_string())
    }

    fn output_repr(&self) -> String {
        self.to_string()
    }
}

impl CallRepr for OperationId {
    fn arg_repr(&self) -> String {
        quote_str(self.as_str())
    }

    fn output_repr(&self) -> String {
        self.to_string()
    }
}

impl CallRepr for StoredValue {
    fn arg_repr(&self) -> String {
        match self {
            Self::Str(s) => s.arg_repr(),
            Self::Bytes(b) => b.arg_repr(),
            Self::Int(i) => i.arg_repr(),
            Self::Float(f) => f.arg_repr(),
        }
    }

    fn output_repr(&self) -> String {
        match self {
            Self::Str(s) => s.output_repr(),
            other => other.arg_repr(),
        }
    }
}

/// `Some(v)` records the quoted form of `v` so a present `"None"` string
/// stays distinguishable from the absent marker.
impl<T: CallRepr> CallRepr for Option<T> {
    fn arg_repr(&self) -> String {
        match self {
            Some(v) => v.arg_repr(),
            None => ABSENT_MARKER.to_string(),
        }
    }

    fn output_repr(&self) -> String {
        self.arg_repr()
    }
}

impl CallRepr for () {
    fn arg_repr(&self) -> String {
        "()".to_string()
    }

    fn output_repr(&self) -> String {
        ABSENT_MARKER.to_string()
    }
}

impl<T: CallRepr + ?Sized> CallRepr for &T {
    fn arg_repr(&self) -> String {
        (**self).arg_repr()
    }

    fn output_repr(&self) -> String {
        (**self).output_repr()
    }
}

impl CallArgs for () {
    fn args_repr(&self) -> String {
        "()".to_string()
    }
}

impl<A: CallRepr> CallArgs for (A,) {
    fn args_repr(&self) -> String {
        format!("({},)", self.0.arg_repr())
    }
}

macro_rules! impl_call_args_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: CallRepr),+> CallArgs for ($($name,)+) {
            fn args_repr(&self) -> String {
                let parts = [$(self.$idx.arg_repr()),+];
                format!("({})", parts.join(", "))
            }
        }
    };
}

impl_call_args_tuple!(A: 0, B: 1);
impl_call_args_tuple!(A: 0, B: 1, C: 2);
impl_call_args_tuple!(A: 0, B: 1, C: 2, D: 3);
