use uuid::Uuid;

/// Opaque job identifier assigned by the storage backend. The watcher never
/// inspects it, only keys on it.
pub type JobId = bytes::Bytes;

/// Identity of one registered watch, minted per `watch` call.
pub type HandleId = Uuid;
