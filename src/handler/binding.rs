//! Storage bindings behind a [`Handler`](super::Handler).
//!
//! Each variant observes storage owned by the application. Numeric kinds
//! share an atomic, byte kinds share a mutex-guarded buffer. The handler only
//! reads and writes through the shared reference.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;

use super::SetResult;
use crate::oid::Oid;
use crate::value::Value;

/// Value kind and backing storage of a handler.
#[derive(Debug, Clone)]
pub enum Binding {
    /// Signed integer bounded by `min..=max`.
    Integer {
        value: Arc<AtomicI32>,
        min: i32,
        max: i32,
    },
    /// Gauge32.
    Gauge32(Arc<AtomicU32>),
    /// Counter32.
    Counter32(Arc<AtomicU32>),
    /// Counter64.
    Counter64(Arc<AtomicU64>),
    /// TimeTicks, in hundredths of a second.
    TimeTicks(Arc<AtomicU32>),
    /// IpAddress.
    IpAddress(Arc<Mutex<Ipv4Addr>>),
    /// Writable OCTET STRING of at most `max_len` bytes.
    OctetString {
        value: Arc<Mutex<Vec<u8>>>,
        max_len: usize,
    },
    /// Fixed OCTET STRING.
    ReadOnlyOctetString(Bytes),
    /// Opaque blob of at most `max_len` bytes.
    Opaque {
        value: Arc<Mutex<Vec<u8>>>,
        max_len: usize,
    },
    /// Fixed OBJECT IDENTIFIER.
    ObjectIdentifier(Oid),
}

impl Binding {
    /// Current value as it goes on the wire.
    pub fn value(&self) -> Value {
        match self {
            Binding::Integer { value, .. } => Value::Integer(value.load(Ordering::Relaxed)),
            Binding::Gauge32(v) => Value::Gauge32(v.load(Ordering::Relaxed)),
            Binding::Counter32(v) => Value::Counter32(v.load(Ordering::Relaxed)),
            Binding::Counter64(v) => Value::Counter64(v.load(Ordering::Relaxed)),
            Binding::TimeTicks(v) => Value::TimeTicks(v.load(Ordering::Relaxed)),
            Binding::IpAddress(v) => {
                Value::IpAddress(v.lock().unwrap_or_else(PoisonError::into_inner).octets())
            }
            Binding::OctetString { value, .. } => Value::OctetString(Bytes::copy_from_slice(
                &value.lock().unwrap_or_else(PoisonError::into_inner),
            )),
            Binding::ReadOnlyOctetString(b) => Value::OctetString(b.clone()),
            Binding::Opaque { value, .. } => Value::Opaque(Bytes::copy_from_slice(
                &value.lock().unwrap_or_else(PoisonError::into_inner),
            )),
            Binding::ObjectIdentifier(oid) => Value::ObjectIdentifier(oid.clone()),
        }
    }

    /// Validate `incoming` against this binding without writing it.
    pub fn check(&self, incoming: &Value) -> SetResult {
        match (self, incoming) {
            (Binding::Integer { min, max, .. }, Value::Integer(v)) => {
                if (*min..=*max).contains(v) {
                    SetResult::Ok
                } else {
                    SetResult::BadValue
                }
            }
            (Binding::Gauge32(_), Value::Gauge32(_))
            | (Binding::Counter32(_), Value::Counter32(_))
            | (Binding::Counter64(_), Value::Counter64(_))
            | (Binding::TimeTicks(_), Value::TimeTicks(_))
            | (Binding::IpAddress(_), Value::IpAddress(_)) => SetResult::Ok,
            (Binding::OctetString { max_len, .. }, Value::OctetString(b))
            | (Binding::Opaque { max_len, .. }, Value::Opaque(b)) => {
                if b.len() <= *max_len {
                    SetResult::Ok
                } else {
                    SetResult::WrongLength
                }
            }
            (Binding::ReadOnlyOctetString(_), Value::OctetString(_))
            | (Binding::ObjectIdentifier(_), Value::ObjectIdentifier(_)) => SetResult::NotWritable,
            _ => SetResult::WrongType,
        }
    }

    /// Validate and write `incoming` into the backing storage.
    ///
    /// Storage is left untouched unless the result is [`SetResult::Ok`].
    pub fn store(&self, incoming: &Value) -> SetResult {
        let result = self.check(incoming);
        if !result.is_ok() {
            return result;
        }
        match (self, incoming) {
            (Binding::Integer { value, .. }, Value::Integer(v)) => {
                value.store(*v, Ordering::Relaxed)
            }
            (Binding::Gauge32(s), Value::Gauge32(v))
            | (Binding::Counter32(s), Value::Counter32(v))
            | (Binding::TimeTicks(s), Value::TimeTicks(v)) => s.store(*v, Ordering::Relaxed),
            (Binding::Counter64(s), Value::Counter64(v)) => s.store(*v, Ordering::Relaxed),
            (Binding::IpAddress(s), Value::IpAddress(v)) => {
                *s.lock().unwrap_or_else(PoisonError::into_inner) = Ipv4Addr::from(*v)
            }
            (Binding::OctetString { value, .. }, Value::OctetString(b))
            | (Binding::Opaque { value, .. }, Value::Opaque(b)) => {
                let mut guard = value.lock().unwrap_or_else(PoisonError::into_inner);
                guard.clear();
                guard.extend_from_slice(b);
            }
            _ => {}
        }
        SetResult::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_bounds() {
        let storage = Arc::new(AtomicI32::new(5));
        let b = Binding::Integer {
            value: storage.clone(),
            min: 0,
            max: 10,
        };
        assert_eq!(b.store(&Value::Integer(11)), SetResult::BadValue);
        assert_eq!(b.store(&Value::Integer(-1)), SetResult::BadValue);
        assert_eq!(storage.load(Ordering::Relaxed), 5);

        assert_eq!(b.store(&Value::Integer(10)), SetResult::Ok);
        assert_eq!(storage.load(Ordering::Relaxed), 10);
        assert_eq!(b.value(), Value::Integer(10));
    }

    #[test]
    fn test_type_mismatch() {
        let b = Binding::Gauge32(Arc::new(AtomicU32::new(0)));
        assert_eq!(b.store(&Value::Counter32(1)), SetResult::WrongType);
        assert_eq!(b.store(&Value::Integer(1)), SetResult::WrongType);
        assert_eq!(b.store(&Value::Gauge32(7)), SetResult::Ok);
        assert_eq!(b.value(), Value::Gauge32(7));
    }

    #[test]
    fn test_octet_string_length() {
        let storage = Arc::new(Mutex::new(b"abc".to_vec()));
        let b = Binding::OctetString {
            value: storage.clone(),
            max_len: 4,
        };
        assert_eq!(
            b.store(&Value::OctetString(Bytes::from_static(b"hello"))),
            SetResult::WrongLength
        );
        assert_eq!(&*storage.lock().unwrap(), b"abc");

        assert_eq!(
            b.store(&Value::OctetString(Bytes::from_static(b"hi"))),
            SetResult::Ok
        );
        assert_eq!(&*storage.lock().unwrap(), b"hi");
    }

    #[test]
    fn test_opaque_is_not_octet_string() {
        let b = Binding::Opaque {
            value: Arc::new(Mutex::new(Vec::new())),
            max_len: 8,
        };
        assert_eq!(
            b.store(&Value::OctetString(Bytes::from_static(b"x"))),
            SetResult::WrongType
        );
        assert_eq!(b.store(&Value::Opaque(Bytes::from_static(b"x"))), SetResult::Ok);
        assert_eq!(b.value(), Value::Opaque(Bytes::from_static(b"x")));
    }

    #[test]
    fn test_fixed_values_reject_writes() {
        let b = Binding::ReadOnlyOctetString(Bytes::from_static(b"fw 1.0"));
        assert_eq!(
            b.store(&Value::OctetString(Bytes::from_static(b"x"))),
            SetResult::NotWritable
        );
        assert_eq!(b.value(), Value::OctetString(Bytes::from_static(b"fw 1.0")));
    }

    #[test]
    fn test_ip_address() {
        let storage = Arc::new(Mutex::new(Ipv4Addr::UNSPECIFIED));
        let b = Binding::IpAddress(storage.clone());
        assert_eq!(b.store(&Value::IpAddress([10, 1, 2, 3])), SetResult::Ok);
        assert_eq!(*storage.lock().unwrap(), Ipv4Addr::new(10, 1, 2, 3));
    }
}
