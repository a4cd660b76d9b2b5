//! Event kinds, raw event records and the notification stream codec.
//!
//! The kernel delivers a packed sequence of variable-length records:
//!
//! ```text
//! +--------+--------+--------+--------+----------------------+
//! | wd i32 | mask   | cookie | len    | name[len] (NUL pad)  |
//! +--------+--------+--------+--------+----------------------+
//! ```
//!
//! All header fields are native-endian 32-bit integers.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;

use bitflags::bitflags;

use super::error::WatchError;
use super::source::WatchHandle;

/// Size of a record header in bytes.
pub const HEADER_LEN: usize = 16;

bitflags! {
    /// Event bits as defined by inotify(7).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u32 {
        const MODIFY = 0x0000_0002;
        const ATTRIB = 0x0000_0004;
        const MOVED_FROM = 0x0000_0040;
        const MOVED_TO = 0x0000_0080;
        const CREATE = 0x0000_0100;
        const DELETE = 0x0000_0200;
        const Q_OVERFLOW = 0x0000_4000;
        const IGNORED = 0x0000_8000;
        const ISDIR = 0x4000_0000;
    }
}

impl EventMask {
    /// Every user-visible event kind. This is also the set requested
    /// for each installed watch.
    pub const KINDS: EventMask = EventMask::CREATE
        .union(EventMask::MODIFY)
        .union(EventMask::DELETE)
        .union(EventMask::MOVED_FROM)
        .union(EventMask::MOVED_TO)
        .union(EventMask::ATTRIB);

    /// Expand the mask into the kinds it carries, in declaration order.
    pub fn kinds(self) -> impl Iterator<Item = EventKind> {
        EventKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(kind.mask()))
    }
}

/// A single kind of filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Deleted,
    Modified,
    MovedFrom,
    MovedTo,
    AttributeChanged,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Created,
        EventKind::Deleted,
        EventKind::Modified,
        EventKind::MovedFrom,
        EventKind::MovedTo,
        EventKind::AttributeChanged,
    ];

    pub fn mask(self) -> EventMask {
        match self {
            EventKind::Created => EventMask::CREATE,
            EventKind::Deleted => EventMask::DELETE,
            EventKind::Modified => EventMask::MODIFY,
            EventKind::MovedFrom => EventMask::MOVED_FROM,
            EventKind::MovedTo => EventMask::MOVED_TO,
            EventKind::AttributeChanged => EventMask::ATTRIB,
        }
    }

    /// Human-readable verb used in diagnostics ("File created: ...").
    pub fn verb(self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Deleted => "deleted",
            EventKind::Modified => "modified",
            EventKind::MovedFrom => "moved from",
            EventKind::MovedTo => "moved to",
            EventKind::AttributeChanged => "attributes changed",
        }
    }
}

impl From<EventKind> for EventMask {
    fn from(kind: EventKind) -> Self {
        kind.mask()
    }
}

/// One decoded record from the notification stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub handle: WatchHandle,
    pub mask: EventMask,
    pub cookie: u32,
    pub name: Option<OsString>,
}

impl RawEvent {
    pub fn new(handle: WatchHandle, mask: EventMask, name: Option<&str>) -> Self {
        Self {
            handle,
            mask,
            cookie: 0,
            name: name.map(OsString::from),
        }
    }

    /// Whether the subject of the event is a directory.
    pub fn is_dir(&self) -> bool {
        self.mask.contains(EventMask::ISDIR)
    }

    pub fn kinds(&self) -> impl Iterator<Item = EventKind> {
        self.mask.kinds()
    }

    pub fn has(&self, kind: EventKind) -> bool {
        self.mask.contains(kind.mask())
    }

    /// Name relative to the watched directory, absent for events about
    /// the watched directory itself.
    pub fn name(&self) -> Option<&OsStr> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }

    /// Lossy UTF-8 view of the name, used for glob matching and display.
    pub fn filename(&self) -> String {
        self.name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Append this record to `out` in the kernel layout.
    ///
    /// The name is NUL terminated and padded to a multiple of the header
    /// field alignment, the same way the kernel does it.
    pub fn encode(&self, out: &mut Vec<u8>) {
        let name = self.name.as_deref().map(OsStrExt::as_bytes).unwrap_or(&[]);
        let len = if name.is_empty() {
            0
        } else {
            (name.len() + 1).next_multiple_of(4)
        };

        out.extend_from_slice(&self.handle.raw().to_ne_bytes());
        out.extend_from_slice(&self.mask.bits().to_ne_bytes());
        out.extend_from_slice(&self.cookie.to_ne_bytes());
        out.extend_from_slice(&(len as u32).to_ne_bytes());
        out.extend_from_slice(name);
        out.resize(out.len() + (len - name.len()), 0);
    }
}

/// Decode a chunk read from the notification source.
///
/// A read always returns whole records, so a header or name running past
/// the end of the chunk means the stream is corrupt.
pub fn decode_events(buf: &[u8]) -> Result<Vec<RawEvent>, WatchError> {
    let mut events = Vec::new();
    let mut offset = 0;

    while offset < buf.len() {
        let remaining = buf.len() - offset;
        if remaining < HEADER_LEN {
            return Err(WatchError::Decode {
                offset,
                reason: format!("truncated header ({remaining} of {HEADER_LEN} bytes)"),
            });
        }

        let field = |at: usize| -> [u8; 4] {
            let start = offset + at;
            [buf[start], buf[start + 1], buf[start + 2], buf[start + 3]]
        };
        let wd = i32::from_ne_bytes(field(0));
        let mask = u32::from_ne_bytes(field(4));
        let cookie = u32::from_ne_bytes(field(8));
        let len = u32::from_ne_bytes(field(12)) as usize;

        let name_start = offset + HEADER_LEN;
        if len > buf.len() - name_start {
            return Err(WatchError::Decode {
                offset,
                reason: format!(
                    "name length {len} exceeds remaining {} bytes",
                    buf.len() - name_start
                ),
            });
        }

        let raw_name = &buf[name_start..name_start + len];
        let name_bytes = match raw_name.iter().position(|b| *b == 0) {
            Some(end) => &raw_name[..end],
            None => raw_name,
        };
        let name = (!name_bytes.is_empty()).then(|| OsStr::from_bytes(name_bytes).to_os_string());

        events.push(RawEvent {
            handle: WatchHandle::new(wd),
            mask: EventMask::from_bits_retain(mask),
            cookie,
            name,
        });

        offset = name_start + len;
    }

    Ok(events)
}
