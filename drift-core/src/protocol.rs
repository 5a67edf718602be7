//! Line-framed sync protocol for clone, fetch, and push.
//!
//! A session is an LF-terminated ASCII conversation over one bidirectional
//! byte stream, opened by the client with `HELLO 1` and an `OP` line. Object
//! payloads ride as length-prefixed raw bytes (the on-disk compressed form)
//! immediately after their `OBJ` header. Both sides transmit their entire
//! store rather than a computed closure; receiving is idempotent because
//! writes are content-addressed. Failures surface as `ERR <reason>` lines
//! and end the session.

use std::io::{Read, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::compress::MAX_OBJECT_SIZE;
use crate::error::{Error, Result};
use crate::fsutil;
use crate::graph;
use crate::oid::{looks_hex40, ObjectId};
use crate::refs::{heads_ref, HeadState, RefStore};
use crate::store::{self, ObjectStore};

/// Default TCP port of the sync transport.
pub const DEFAULT_PORT: u16 = 9418;

/// Protocol greeting; anything else is rejected.
pub const HELLO_LINE: &str = "HELLO 1";

/// Branch token advertised for a detached server HEAD.
pub const DETACHED: &str = "DETACHED";

/// A server's advertised head: branch name (or [`DETACHED`]) and tip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefAdvert {
    pub branch: String,
    pub tip: Option<ObjectId>,
}

// ==================== Line framing ====================

fn write_line<S: Write>(stream: &mut S, line: &str) -> Result<()> {
    stream.write_all(line.as_bytes())?;
    stream.write_all(b"\n")?;
    Ok(())
}

/// Read one LF-terminated line, byte at a time. EOF mid-line is a protocol
/// error: lines are never legitimately truncated.
fn read_line<S: Read>(stream: &mut S) -> Result<String> {
    let mut out = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte)?;
        if n == 0 {
            return Err(Error::ProtocolError("unexpected end of stream".into()));
        }
        if byte[0] == b'\n' {
            break;
        }
        out.push(byte[0]);
    }
    String::from_utf8(out).map_err(|_| Error::ProtocolError("non-ASCII protocol line".into()))
}

// ==================== Object streaming ====================

/// Send every object file in the store: `NOBJ <n>`, then per object an
/// `OBJ <hex> <len>` header plus raw bytes, then `DONE`.
fn send_objects<S: Write>(stream: &mut S, objects_dir: &Path) -> Result<()> {
    let files = fsutil::walk_files(objects_dir)?;
    write_line(stream, &format!("NOBJ {}", files.len()))?;

    for path in &files {
        let rel = path.strip_prefix(objects_dir).unwrap_or(path);
        let hex: String = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .concat();
        let data = std::fs::read(path)?;
        write_line(stream, &format!("OBJ {hex} {}", data.len()))?;
        stream.write_all(&data)?;
    }
    write_line(stream, "DONE")?;
    debug!(count = files.len(), "sent object stream");
    Ok(())
}

/// Receive an object stream into a fan-out directory, atomically replacing
/// each file.
fn recv_objects<S: Read>(stream: &mut S, objects_dir: &Path) -> Result<()> {
    let nline = read_line(stream)?;
    let count: usize = nline
        .strip_prefix("NOBJ ")
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::ProtocolError(format!("expected NOBJ <n>, got {nline:?}")))?;

    std::fs::create_dir_all(objects_dir)?;

    for _ in 0..count {
        let oline = read_line(stream)?;
        let rest = oline
            .strip_prefix("OBJ ")
            .ok_or_else(|| Error::ProtocolError(format!("expected OBJ header, got {oline:?}")))?;
        let (hex, size_str) = rest
            .split_once(' ')
            .ok_or_else(|| Error::ProtocolError(format!("malformed OBJ header: {oline:?}")))?;
        if !looks_hex40(hex) {
            return Err(Error::ProtocolError(format!("malformed object id: {hex:?}")));
        }
        let size: usize = size_str
            .parse()
            .map_err(|_| Error::ProtocolError(format!("malformed object size: {size_str:?}")))?;
        if size > MAX_OBJECT_SIZE {
            return Err(Error::ProtocolError(format!("object {hex} too large: {size}")));
        }

        let mut buf = vec![0u8; size];
        stream.read_exact(&mut buf)?;
        fsutil::write_atomic(&store::fanout_path(objects_dir, hex), &buf)?;
    }

    let done = read_line(stream)?;
    if done != "DONE" {
        return Err(Error::ProtocolError(format!("expected DONE, got {done:?}")));
    }
    debug!(count, "received object stream");
    Ok(())
}

// ==================== Advertisement ====================

/// What this repository would advertise as its head.
pub fn head_advert(control_dir: &Path) -> Result<RefAdvert> {
    let refs = RefStore::new(control_dir.to_path_buf());
    let advert = match refs.head()? {
        None => RefAdvert {
            branch: DETACHED.to_string(),
            tip: None,
        },
        Some(HeadState::Detached(id)) => RefAdvert {
            branch: DETACHED.to_string(),
            tip: Some(id),
        },
        Some(HeadState::Symbolic(refname)) => {
            let tip = match refs.read(&refname)? {
                Some(hex) => Some(ObjectId::from_hex(&hex)?),
                None => None,
            };
            RefAdvert {
                branch: short_branch(&refname),
                tip,
            }
        }
        Some(HeadState::Unborn(refname)) => RefAdvert {
            branch: short_branch(&refname),
            tip: None,
        },
    };
    Ok(advert)
}

fn short_branch(refname: &str) -> String {
    refname
        .strip_prefix("refs/heads/")
        .unwrap_or(refname)
        .to_string()
}

fn format_ref_line(advert: &RefAdvert) -> String {
    let tip = advert.tip.map(|id| id.to_hex()).unwrap_or_default();
    format!("REF {} {}", advert.branch, tip)
}

fn parse_ref_line(line: &str) -> Result<RefAdvert> {
    let rest = line
        .strip_prefix("REF ")
        .ok_or_else(|| Error::ProtocolError(format!("expected REF header, got {line:?}")))?;
    let (branch, tip_str) = match rest.split_once(' ') {
        Some((b, t)) => (b, t),
        None => (rest, ""),
    };
    let tip = if tip_str.is_empty() {
        None
    } else {
        Some(ObjectId::from_hex(tip_str)?)
    };
    Ok(RefAdvert {
        branch: branch.to_string(),
        tip,
    })
}

// ==================== Client sessions ====================

/// Run the receiving half of a CLONE or FETCH session: handshake, take the
/// advertised head, pull all objects into `objects_dir`.
pub fn client_fetch_stream<S: Read + Write>(
    stream: &mut S,
    op_line: &str,
    objects_dir: &Path,
) -> Result<RefAdvert> {
    write_line(stream, HELLO_LINE)?;
    write_line(stream, op_line)?;
    let advert = parse_ref_line(&read_line(stream)?)?;
    recv_objects(stream, objects_dir)?;
    Ok(advert)
}

/// Run a PUSH session: propose the new tip, stream all local objects, and
/// wait for the server's fast-forward verdict.
pub fn client_push_stream<S: Read + Write>(
    stream: &mut S,
    objects_dir: &Path,
    branch: &str,
    tip: &ObjectId,
) -> Result<()> {
    write_line(stream, HELLO_LINE)?;
    write_line(stream, &format!("OP PUSH {branch}"))?;
    write_line(stream, &format!("NEW {}", tip.to_hex()))?;

    let okgo = read_line(stream)?;
    if okgo != "OKGO" {
        return Err(push_refusal(branch, &okgo));
    }

    send_objects(stream, objects_dir)?;

    let verdict = read_line(stream)?;
    if verdict != "OK" {
        return Err(push_refusal(branch, &verdict));
    }
    Ok(())
}

fn push_refusal(branch: &str, line: &str) -> Error {
    if line == "ERR non-fast-forward" {
        Error::NonFastForward(heads_ref(branch))
    } else {
        Error::ProtocolError(format!("server refused push: {line}"))
    }
}

// ==================== Server session ====================

/// Serve one client session against the repository whose control directory
/// is `control_dir`. Returns after the session's final line; callers accept
/// the next connection afterwards.
pub fn serve_session<S: Read + Write>(stream: &mut S, control_dir: &Path) -> Result<()> {
    let hello = read_line(stream)?;
    if hello != HELLO_LINE {
        write_line(stream, "ERR unsupported protocol")?;
        return Err(Error::ProtocolError(format!("unexpected hello: {hello:?}")));
    }

    let op = read_line(stream)?;
    let objects_dir = control_dir.join(store::OBJECTS_DIR);

    if op == "OP CLONE" || op == "OP FETCH" {
        let advert = head_advert(control_dir)?;
        info!(op = %op, branch = %advert.branch, "serving read session");
        write_line(stream, &format_ref_line(&advert))?;
        send_objects(stream, &objects_dir)?;
        return Ok(());
    }

    if let Some(branch) = op.strip_prefix("OP PUSH ") {
        let nline = read_line(stream)?;
        let new_id = match nline.strip_prefix("NEW ").map(ObjectId::from_hex) {
            Some(Ok(id)) => id,
            _ => {
                write_line(stream, "ERR expected NEW <tip>")?;
                return Err(Error::ProtocolError(format!("bad NEW line: {nline:?}")));
            }
        };
        write_line(stream, "OKGO")?;
        recv_objects(stream, &objects_dir)?;

        let refs = RefStore::new(control_dir.to_path_buf());
        let refname = heads_ref(branch);
        if let Some(cur_hex) = refs.read(&refname)? {
            let cur = ObjectId::from_hex(&cur_hex)?;
            let store = ObjectStore::new(control_dir.to_path_buf());
            if !graph::is_ancestor(&store, &cur, &new_id)? {
                info!(branch, "rejecting non-fast-forward push");
                write_line(stream, "ERR non-fast-forward")?;
                return Ok(());
            }
        }
        refs.write(&refname, &new_id.to_hex())?;
        info!(branch, tip = %new_id, "accepted push");
        write_line(stream, "OK")?;
        return Ok(());
    }

    write_line(stream, "ERR unknown op")?;
    Ok(())
}
