//! Replay sources for feeding the engine without live hardware
//!
//! Real deployments receive samples from the transport boundary; tests
//! and bench rigs replay recorded telemetry instead. Both speak the same
//! non-blocking [`Stream`] trait (`nb`-style, so the same consumer loop
//! works under an interrupt-driven poll or a plain host loop):
//!
//! - [`MemoryStream`] replays a slice of samples, zero I/O.
//! - [`ReplayStream`] (std) reads a recorded CSV session, one sample per
//!   row. Malformed rows are skipped and counted rather than aborting
//!   the replay, matching how the transport boundary treats malformed
//!   input: rejected before the engine sees it.
//!
//! CSV layout: `voltage,impedance,int_temp,surface_temp,capacity,soc,status`
//! where status is `charging`/`discharging` (case-insensitive) or the
//! wire flag `1`/`0`.

use thiserror_no_std::Error;

use crate::telemetry::{OperatingMode, TelemetrySample};

/// Stream error types
#[derive(Debug, Error)]
pub enum StreamError {
    /// No more samples will ever arrive
    #[error("end of stream")]
    EndOfStream,
    /// A row could not be parsed (reported, then skipped)
    #[error("bad field: {0}")]
    Format(&'static str),
    /// Underlying I/O failure
    #[cfg(feature = "std")]
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Non-blocking sample source
pub trait Stream {
    /// Poll for the next sample
    ///
    /// Returns `Err(nb::Error::WouldBlock)` when nothing is available
    /// yet and `Err(nb::Error::Other(StreamError::EndOfStream))` when
    /// the source is exhausted.
    fn poll_next(&mut self) -> nb::Result<TelemetrySample, StreamError>;

    /// Hint about remaining samples
    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, None)
    }
}

/// Replay a fixed slice of samples
#[cfg(feature = "replay-memory")]
pub struct MemoryStream<'a> {
    samples: &'a [TelemetrySample],
    position: usize,
}

#[cfg(feature = "replay-memory")]
impl<'a> MemoryStream<'a> {
    /// Stream over a recorded slice
    pub fn new(samples: &'a [TelemetrySample]) -> Self {
        Self { samples, position: 0 }
    }

    /// Restart the replay from the beginning
    pub fn reset(&mut self) {
        self.position = 0;
    }
}

#[cfg(feature = "replay-memory")]
impl Stream for MemoryStream<'_> {
    fn poll_next(&mut self) -> nb::Result<TelemetrySample, StreamError> {
        let sample = self
            .samples
            .get(self.position)
            .ok_or(nb::Error::Other(StreamError::EndOfStream))?;
        self.position += 1;
        Ok(*sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.samples.len() - self.position;
        (remaining, Some(remaining))
    }
}

/// Replay a recorded CSV telemetry session from disk
#[cfg(feature = "replay-file")]
pub struct ReplayStream {
    reader: std::io::BufReader<std::fs::File>,
    skip_lines: usize,
    parse_errors: u32,
    line_number: u64,
}

#[cfg(feature = "replay-file")]
impl ReplayStream {
    /// Open a CSV recording
    pub fn from_csv(path: &std::path::Path) -> Result<Self, StreamError> {
        let file = std::fs::File::open(path).map_err(StreamError::Io)?;
        Ok(Self {
            reader: std::io::BufReader::new(file),
            skip_lines: 0,
            parse_errors: 0,
            line_number: 0,
        })
    }

    /// Skip leading lines (headers)
    pub fn with_skip_lines(mut self, lines: usize) -> Self {
        self.skip_lines = lines;
        self
    }

    /// How many rows failed to parse and were skipped
    pub fn parse_errors(&self) -> u32 {
        self.parse_errors
    }

    fn read_line(&mut self) -> Result<Option<String>, StreamError> {
        use std::io::BufRead;

        let mut line = String::new();
        let n = self.reader.read_line(&mut line).map_err(StreamError::Io)?;
        if n == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        Ok(Some(line))
    }
}

#[cfg(feature = "replay-file")]
impl Stream for ReplayStream {
    fn poll_next(&mut self) -> nb::Result<TelemetrySample, StreamError> {
        loop {
            let line = self
                .read_line()
                .map_err(nb::Error::Other)?
                .ok_or(nb::Error::Other(StreamError::EndOfStream))?;

            if self.line_number <= self.skip_lines as u64 {
                continue;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match parse_csv_row(line) {
                Ok(sample) => return Ok(sample),
                Err(reason) => {
                    self.parse_errors += 1;
                    log::warn!("replay: skipped malformed row {}: {reason}", self.line_number);
                }
            }
        }
    }
}

#[cfg(feature = "replay-file")]
fn parse_csv_row(line: &str) -> Result<TelemetrySample, &'static str> {
    let mut fields = line.split(',').map(str::trim);
    let mut next_f32 = |name| {
        fields
            .next()
            .ok_or(name)
            .and_then(|f| f.parse::<f32>().map_err(|_| name))
    };

    let voltage = next_f32("voltage")?;
    let impedance = next_f32("impedance")?;
    let int_temp = next_f32("int_temp")?;
    let surface_temp = next_f32("surface_temp")?;
    let capacity = next_f32("capacity")?;
    let soc = next_f32("soc")?;

    let mode = match fields.next().map(str::to_ascii_lowercase).as_deref() {
        Some("charging") | Some("1") => OperatingMode::Charging,
        Some("discharging") | Some("0") => OperatingMode::Discharging,
        Some(_) | None => return Err("status"),
    };

    Ok(TelemetrySample::new(
        voltage,
        impedance,
        int_temp,
        surface_temp,
        capacity,
        soc,
        mode,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "replay-memory")]
    #[test]
    fn memory_stream_replays_in_order() {
        let samples = [
            TelemetrySample::new(3.7, 0.03, 25.0, 24.0, 0.95, 50.0, OperatingMode::Discharging),
            TelemetrySample::new(3.8, 0.03, 25.0, 24.0, 0.95, 60.0, OperatingMode::Charging),
        ];
        let mut stream = MemoryStream::new(&samples);
        assert_eq!(stream.size_hint(), (2, Some(2)));

        assert_eq!(stream.poll_next().unwrap().soc, 50);
        assert_eq!(stream.poll_next().unwrap().soc, 60);
        assert!(matches!(
            stream.poll_next(),
            Err(nb::Error::Other(StreamError::EndOfStream))
        ));

        stream.reset();
        assert_eq!(stream.poll_next().unwrap().soc, 50);
    }

    #[cfg(feature = "replay-file")]
    mod replay_file {
        use super::*;
        use std::io::Write;
        use tempfile::NamedTempFile;

        #[test]
        fn csv_rows_become_samples() {
            let mut file = NamedTempFile::new().unwrap();
            writeln!(file, "voltage,impedance,int_temp,surface_temp,capacity,soc,status").unwrap();
            writeln!(file, "3.7,0.03,25.0,24.0,0.95,50,discharging").unwrap();
            writeln!(file, "4.1,0.04,26.0,25.0,0.95,80,Charging").unwrap();
            file.flush().unwrap();

            let mut stream = ReplayStream::from_csv(file.path()).unwrap().with_skip_lines(1);

            let first = stream.poll_next().unwrap();
            assert_eq!(first.voltage, 3.7);
            assert_eq!(first.soc, 50);
            assert_eq!(first.mode, OperatingMode::Discharging);

            let second = stream.poll_next().unwrap();
            assert_eq!(second.mode, OperatingMode::Charging);

            assert!(matches!(
                stream.poll_next(),
                Err(nb::Error::Other(StreamError::EndOfStream))
            ));
            assert_eq!(stream.parse_errors(), 0);
        }

        #[test]
        fn malformed_rows_are_skipped_and_counted() {
            let mut file = NamedTempFile::new().unwrap();
            writeln!(file, "3.7,0.03,25.0,24.0,0.95,50,discharging").unwrap();
            writeln!(file, "not,a,row").unwrap();
            writeln!(file, "3.7,0.03,25.0,24.0,0.95,banana,charging").unwrap();
            writeln!(file, "3.8,0.03,25.0,24.0,0.95,55,1").unwrap();
            file.flush().unwrap();

            let mut stream = ReplayStream::from_csv(file.path()).unwrap();

            assert_eq!(stream.poll_next().unwrap().soc, 50);
            // Both bad rows skipped; the numeric status flag still parses
            let last = stream.poll_next().unwrap();
            assert_eq!(last.soc, 55);
            assert_eq!(last.mode, OperatingMode::Charging);
            assert_eq!(stream.parse_errors(), 2);
        }
    }
}
