//! Receive assembler.
//!
//! Bytes enter through the producer half of a single-producer,
//! single-consumer queue that holds exactly one request frame. Once the
//! queue is full, further bytes are counted and dropped until the consumer
//! drains the frame. There is no delimiter scan: a stray byte shifts every
//! later window until a checksum failure is reported and the queue re-arms.

use bluosec_protocol::{RawRequest, REQUEST_FRAME_LEN};
use heapless::spsc::{Consumer, Producer, Queue};
use std::sync::atomic::{AtomicU64, Ordering};

/// Backing slots of the queue; one slot stays unused.
pub const RX_QUEUE_SLOTS: usize = REQUEST_FRAME_LEN + 1;

type RxQueue = Queue<u8, RX_QUEUE_SLOTS>;

/// Frame-sized receive buffer.
pub struct Assembler {
    queue: RxQueue,
    dropped: AtomicU64,
}

impl Assembler {
    pub const fn new() -> Self {
        Self {
            queue: Queue::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueues one byte; returns `false` if it was dropped.
    pub fn receive_byte(&mut self, byte: u8) -> bool {
        match self.queue.enqueue(byte) {
            Ok(()) => true,
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Drains a frame once exactly 17 bytes are buffered.
    pub fn poll_frame(&mut self) -> Option<RawRequest> {
        if self.queue.len() != REQUEST_FRAME_LEN {
            return None;
        }
        let mut raw = [0u8; REQUEST_FRAME_LEN];
        for slot in raw.iter_mut() {
            *slot = self.queue.dequeue()?;
        }
        Some(RawRequest(raw))
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.queue.len()
    }

    /// Bytes dropped since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Splits into the receive side and the frame side.
    pub fn split(&mut self) -> (ByteReceiver<'_>, FrameAssembler<'_>) {
        let (producer, consumer) = self.queue.split();
        (
            ByteReceiver {
                producer,
                dropped: &self.dropped,
            },
            FrameAssembler { consumer },
        )
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer half, owned by the receive context.
pub struct ByteReceiver<'a> {
    producer: Producer<'a, u8, RX_QUEUE_SLOTS>,
    dropped: &'a AtomicU64,
}

impl ByteReceiver<'_> {
    /// Enqueues one byte; returns `false` if it was dropped.
    pub fn receive_byte(&mut self, byte: u8) -> bool {
        match self.producer.enqueue(byte) {
            Ok(()) => true,
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer half, owned by the processing context.
pub struct FrameAssembler<'a> {
    consumer: Consumer<'a, u8, RX_QUEUE_SLOTS>,
}

impl FrameAssembler<'_> {
    /// Drains a frame once exactly 17 bytes are buffered.
    pub fn poll_frame(&mut self) -> Option<RawRequest> {
        if self.consumer.len() != REQUEST_FRAME_LEN {
            return None;
        }
        let mut raw = [0u8; REQUEST_FRAME_LEN];
        for slot in raw.iter_mut() {
            *slot = self.consumer.dequeue()?;
        }
        Some(RawRequest(raw))
    }
}
