// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Frame pump: transport packets in, converted pictures out.

use crate::{
    backend::{Backend, Decoder, Input, Packet, Scaler},
    session::CaptureSession,
    Error,
};

/// Why a session stopped delivering frames.
///
/// [`CaptureSession::read_frame`] reports both cases with the same `None`
/// sentinel; this lets callers that care tell them apart afterwards.
#[derive(Debug)]
pub enum StreamEnd {
    /// The transport has no further packets
    Exhausted,
    /// Reading from the transport or converting a picture failed
    Failed(Error),
}

impl StreamEnd {
    pub fn is_failure(&self) -> bool {
        matches!(self, StreamEnd::Failed(_))
    }
}

impl<B: Backend> CaptureSession<B> {
    /// Pull the next frame, converted into the session's output buffer.
    ///
    /// Reads packets until the decoder completes a picture. Pictures the
    /// decoder still holds from earlier packets are delivered first. Packets
    /// of other streams are dropped, packets that leave the decoder without a
    /// complete picture are consumed silently, and packets the decoder rejects
    /// are skipped with a warning. The returned slice is the session's output
    /// buffer: same address on every call, contents overwritten by the next
    /// read.
    ///
    /// Returns `None` at the end of the stream or on a transport read or
    /// conversion error. Both are terminal for the session: from then on each
    /// call returns `None` without touching the device again, and
    /// [`end_reason`](Self::end_reason) tells which case occurred.
    ///
    /// # Example
    ///
    /// ```
    /// use videograb::mock::{MockBackend, MockDevice};
    /// use videograb::{CaptureConfig, CodecId, PixelFormat};
    ///
    /// let backend = MockBackend::new(MockDevice::camera(
    ///     CodecId::RawVideo,
    ///     PixelFormat::Yuyv422,
    ///     64,
    ///     48,
    ///     2,
    /// ));
    /// let mut session = CaptureConfig::default()
    ///     .with_resolution(64, 48)
    ///     .open(&backend)?;
    ///
    /// let mut frames = Vec::new();
    /// while let Some(frame) = session.read_frame() {
    ///     frames.push(frame.to_vec());
    /// }
    /// assert_eq!(frames.len(), 2);
    /// # Ok::<(), videograb::Error>(())
    /// ```
    pub fn read_frame(&mut self) -> Option<&[u8]> {
        if self.end.is_some() {
            return None;
        }

        match self.pump() {
            Ok(true) => {
                self.frames_read += 1;
                log::trace!("frame {} ready", self.frames_read);
                Some(self.output.data())
            }
            Ok(false) => {
                log::debug!("end of stream after {} frames", self.frames_read);
                self.end = Some(StreamEnd::Exhausted);
                None
            }
            Err(err) => {
                log::warn!("capture stopped after {} frames: {}", self.frames_read, err);
                self.end = Some(StreamEnd::Failed(err));
                None
            }
        }
    }

    /// Why the session stopped delivering frames, `None` while it is live.
    pub fn end_reason(&self) -> Option<&StreamEnd> {
        self.end.as_ref()
    }

    /// Whether [`read_frame`](Self::read_frame) will only return `None` from now on.
    pub fn is_ended(&self) -> bool {
        self.end.is_some()
    }

    /// Returns `Ok(true)` once a frame sits in the output buffer, `Ok(false)`
    /// when the transport ran dry.
    fn pump(&mut self) -> Result<bool, Error> {
        let stream_index = self.stream_index();

        loop {
            let ready = match self.decoder.drain(&mut self.encoded) {
                Ok(ready) => ready,
                Err(err) => {
                    log::warn!("discarding buffered picture: {}", err);
                    false
                }
            };

            if !ready {
                let packet = match self.input.read_packet()? {
                    Some(packet) => packet,
                    None => return Ok(false),
                };

                if packet.stream_index() != stream_index {
                    log::trace!("dropping packet of stream {}", packet.stream_index());
                    continue;
                }

                match self.decoder.decode(&packet, &mut self.encoded) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(err) => {
                        log::warn!("skipping packet after frame {}: {}", self.frames_read, err);
                        continue;
                    }
                }
            }

            self.scaler.scale(&self.encoded, self.output.data_mut())?;
            return Ok(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_stream_end_failure() {
        assert!(!StreamEnd::Exhausted.is_failure());
        let failed = StreamEnd::Failed(Error::Read(io::Error::from(io::ErrorKind::BrokenPipe)));
        assert!(failed.is_failure());
    }
}
