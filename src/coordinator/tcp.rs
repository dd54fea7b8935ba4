//! TCP wire for one rank per process
//!
//! Each neighbor pair shares one connection. The lower rank dials, the
//! higher rank accepts, and the dialer opens with `Frame::Hello`. Frames are
//! bincode payloads behind a little-endian `u32` length prefix. Every
//! connection gets a reader thread and a writer thread, so posting a send
//! never blocks on the socket.

use std::collections::BTreeMap;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::coordinator::wire::{Frame, SendHandle, Wire};
use crate::error::TransportError;

/// Frames larger than this are treated as corrupt
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Write one length-prefixed frame
pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> Result<(), TransportError> {
    let bytes = frame.to_bytes()?;
    let len = u32::try_from(bytes.len())
        .ok()
        .filter(|&len| len as usize <= MAX_FRAME_LEN)
        .ok_or_else(|| TransportError::Encoding(format!("frame of {} bytes is too large", bytes.len())))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read one length-prefixed frame
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Frame, TransportError> {
    let mut header = [0u8; 4];
    reader.read_exact(&mut header)?;
    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::Encoding(format!(
            "frame length {len} exceeds {MAX_FRAME_LEN}"
        )));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Frame::from_bytes(&payload)
}

type Outbound = (Frame, Sender<Result<(), TransportError>>);

struct PeerLink {
    outgoing: Sender<Outbound>,
    incoming: Receiver<Result<Frame, TransportError>>,
}

/// Connections from this rank to each of its neighbors
pub struct TcpWire {
    rank: usize,
    peers: BTreeMap<usize, PeerLink>,
}

impl TcpWire {
    /// Bind this rank's address and connect to every neighbor.
    ///
    /// Dialing is retried until `timeout` elapses, so ranks may start in any
    /// order. Accepting is bounded by the same deadline.
    pub fn connect(
        rank: usize,
        addresses: &[SocketAddr],
        neighbors: &[usize],
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let own = *addresses
            .get(rank)
            .ok_or_else(|| TransportError::Bootstrap(format!("no address for rank {rank}")))?;
        if let Some(&missing) = neighbors.iter().find(|&&n| n >= addresses.len()) {
            return Err(TransportError::Bootstrap(format!(
                "no address for neighbor {missing}"
            )));
        }

        let listener = TcpListener::bind(own)?;
        let deadline = Instant::now() + timeout;
        info!(rank, address = %own, neighbors = ?neighbors, "connecting to neighbors");

        let mut wire = Self {
            rank,
            peers: BTreeMap::new(),
        };

        for &peer in neighbors.iter().filter(|&&n| n > rank) {
            let mut stream = dial(addresses[peer], deadline)?;
            write_frame(&mut stream, &Frame::Hello { rank })?;
            debug!(rank, peer, "dialed");
            wire.attach(peer, stream)?;
        }

        let mut expected: Vec<usize> = neighbors.iter().copied().filter(|&n| n < rank).collect();
        expected.sort_unstable();
        expected.dedup();
        listener.set_nonblocking(true)?;
        while !expected.is_empty() {
            match listener.accept() {
                Ok((stream, from)) => {
                    stream.set_nonblocking(false)?;
                    let mut stream = stream;
                    let peer = match read_frame(&mut stream)? {
                        Frame::Hello { rank } => rank,
                        other => {
                            return Err(TransportError::Bootstrap(format!(
                                "expected hello from {from}, got {}",
                                other.kind()
                            )))
                        }
                    };
                    let Some(slot) = expected.iter().position(|&n| n == peer) else {
                        return Err(TransportError::Bootstrap(format!(
                            "unexpected connection from rank {peer} at {from}"
                        )));
                    };
                    expected.swap_remove(slot);
                    debug!(rank, peer, "accepted");
                    wire.attach(peer, stream)?;
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(TransportError::Bootstrap(format!(
                            "rank {rank} timed out waiting for ranks {expected:?}"
                        )));
                    }
                    thread::sleep(RETRY_DELAY);
                }
                Err(err) => return Err(err.into()),
            }
        }

        info!(rank, peers = wire.peers.len(), "all neighbor links established");
        Ok(wire)
    }

    fn attach(&mut self, peer: usize, stream: TcpStream) -> Result<(), TransportError> {
        stream.set_nodelay(true)?;
        let read_half = stream.try_clone()?;
        let rank = self.rank;

        let (in_tx, in_rx) = mpsc::channel();
        thread::Builder::new()
            .name(format!("rank-{rank}-recv-{peer}"))
            .spawn(move || reader_loop(peer, read_half, in_tx))?;

        let (out_tx, out_rx) = mpsc::channel::<Outbound>();
        thread::Builder::new()
            .name(format!("rank-{rank}-send-{peer}"))
            .spawn(move || writer_loop(stream, out_rx))?;

        self.peers.insert(
            peer,
            PeerLink {
                outgoing: out_tx,
                incoming: in_rx,
            },
        );
        Ok(())
    }
}

fn dial(address: SocketAddr, deadline: Instant) -> Result<TcpStream, TransportError> {
    loop {
        match TcpStream::connect(address) {
            Ok(stream) => return Ok(stream),
            Err(err) if Instant::now() < deadline => {
                debug!(%address, error = %err, "dial failed, retrying");
                thread::sleep(RETRY_DELAY);
            }
            Err(err) => {
                return Err(TransportError::Bootstrap(format!(
                    "could not reach {address}: {err}"
                )))
            }
        }
    }
}

fn reader_loop(peer: usize, stream: TcpStream, frames: Sender<Result<Frame, TransportError>>) {
    let mut reader = BufReader::new(stream);
    loop {
        let result = read_frame(&mut reader).map_err(|err| match err {
            TransportError::Io(io) if io.kind() == io::ErrorKind::UnexpectedEof => {
                TransportError::Disconnected { peer }
            }
            other => other,
        });
        let failed = result.is_err();
        if frames.send(result).is_err() || failed {
            return;
        }
    }
}

fn writer_loop(stream: TcpStream, outbound: Receiver<Outbound>) {
    let mut writer = BufWriter::new(&stream);
    for (frame, done) in outbound {
        let result = write_frame(&mut writer, &frame);
        let failed = result.is_err();
        let _ = done.send(result);
        if failed {
            break;
        }
    }
    drop(writer);
    let _ = stream.shutdown(Shutdown::Write);
}

impl Wire for TcpWire {
    fn rank(&self) -> usize {
        self.rank
    }

    fn post_send(&mut self, peer: usize, frame: Frame) -> Result<SendHandle, TransportError> {
        let link = self
            .peers
            .get(&peer)
            .ok_or(TransportError::Disconnected { peer })?;
        let (done_tx, done_rx) = mpsc::channel();
        link.outgoing
            .send((frame, done_tx))
            .map_err(|_| TransportError::Disconnected { peer })?;
        Ok(SendHandle::Pending {
            peer,
            done: done_rx,
        })
    }

    fn recv_from(&mut self, peer: usize) -> Result<Frame, TransportError> {
        let link = self
            .peers
            .get(&peer)
            .ok_or(TransportError::Disconnected { peer })?;
        link.incoming
            .recv()
            .unwrap_or(Err(TransportError::Disconnected { peer }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn free_addresses(count: usize) -> Vec<SocketAddr> {
        (0..count)
            .map(|_| {
                let listener = TcpListener::bind("127.0.0.1:0").unwrap();
                listener.local_addr().unwrap()
            })
            .collect()
    }

    #[test]
    fn test_frame_codec() {
        let mut buffer = Vec::new();
        let frames = vec![
            Frame::Hello { rank: 3 },
            Frame::Emigrants {
                generation: 2,
                genes: vec![0.5; 6],
            },
        ];
        for frame in &frames {
            write_frame(&mut buffer, frame).unwrap();
        }
        let mut cursor = Cursor::new(buffer);
        for frame in &frames {
            assert_eq!(&read_frame(&mut cursor).unwrap(), frame);
        }
        assert!(read_frame(&mut cursor).is_err());
    }

    #[test]
    fn test_oversized_length_rejected() {
        let mut cursor = Cursor::new(u32::MAX.to_le_bytes().to_vec());
        assert!(matches!(
            read_frame(&mut cursor),
            Err(TransportError::Encoding(_))
        ));
    }

    #[test]
    fn test_two_ranks_exchange_frames() {
        let addresses = free_addresses(2);
        let remote = addresses.clone();
        let handle = thread::spawn(move || {
            let mut wire = TcpWire::connect(1, &remote, &[0], Duration::from_secs(5)).unwrap();
            let frame = wire.recv_from(0).unwrap();
            wire.post_send(0, frame).unwrap().wait().unwrap();
        });

        let mut wire = TcpWire::connect(0, &addresses, &[1], Duration::from_secs(5)).unwrap();
        let frame = Frame::Emigrants {
            generation: 0,
            genes: vec![1.0, 2.0],
        };
        wire.post_send(1, frame.clone()).unwrap().wait().unwrap();
        assert_eq!(wire.recv_from(1).unwrap(), frame);
        handle.join().unwrap();
    }

    #[test]
    fn test_dial_times_out() {
        let addresses = free_addresses(2);
        let result = TcpWire::connect(0, &addresses, &[1], Duration::from_millis(300));
        assert!(matches!(result, Err(TransportError::Bootstrap(_))));
    }
}
