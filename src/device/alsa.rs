//! ALSA PCM streams via the `alsa` crate.

use alsa::pcm::{Access, Format, HwParams, IoFormat, PCM};
use alsa::ValueOr;

use super::{
    Direction, Interleaved, InterleavedMut, PcmBackend, PcmStream, Resume, StreamParams,
};
use crate::config::SampleFormat;
use crate::error::XferError;

/// Opens blocking ALSA PCM handles.
#[derive(Debug, Default)]
pub struct AlsaBackend;

impl PcmBackend for AlsaBackend {
    type Stream = AlsaPcm;

    fn open(&mut self, direction: Direction, device: &str) -> Result<AlsaPcm, String> {
        let dir = match direction {
            Direction::Playback => alsa::Direction::Playback,
            Direction::Capture => alsa::Direction::Capture,
        };
        let pcm = PCM::new(device, dir, false).map_err(|e| e.to_string())?;
        Ok(AlsaPcm {
            pcm,
            channels: 0,
            format: None,
        })
    }
}

/// One ALSA PCM handle in blocking interleaved read/write mode.
pub struct AlsaPcm {
    pcm: PCM,
    channels: usize,
    format: Option<SampleFormat>,
}

fn native_format(format: SampleFormat) -> Format {
    let little = cfg!(target_endian = "little");
    match format {
        SampleFormat::S16 if little => Format::S16LE,
        SampleFormat::S16 => Format::S16BE,
        SampleFormat::S24 | SampleFormat::S24Headroom if little => Format::S24LE,
        SampleFormat::S24 | SampleFormat::S24Headroom => Format::S24BE,
        SampleFormat::S32 if little => Format::S32LE,
        SampleFormat::S32 => Format::S32BE,
    }
}

fn xfer_err(err: alsa::Error) -> XferError {
    match err.errno().abs() {
        libc::EPIPE => XferError::Xrun,
        libc::ESTRPIPE => XferError::Suspended,
        errno => XferError::Errno(errno),
    }
}

fn errno_of(err: XferError) -> i32 {
    match err {
        XferError::Xrun => libc::EPIPE,
        XferError::Suspended => libc::ESTRPIPE,
        XferError::Errno(errno) => errno,
    }
}

impl AlsaPcm {
    fn set_hw_params(&self, params: &StreamParams) -> alsa::Result<u32> {
        let hwp = HwParams::any(&self.pcm)?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(native_format(params.format))?;
        hwp.set_channels(params.channels as u32)?;
        // rate mismatches are a configuration error, not something to resample
        hwp.set_rate_resample(false)?;
        hwp.set_rate(params.sample_rate, ValueOr::Nearest)?;
        if let Some(period) = params.period_frames {
            let period = hwp.set_period_size_near(period as alsa::pcm::Frames, ValueOr::Nearest)?;
            // one period in flight plus the one being filled
            hwp.set_buffer_size_near(period * 2)?;
        }
        self.pcm.hw_params(&hwp)?;

        let current = self.pcm.hw_params_current()?;
        current.get_rate()
    }

    /// Interleaved IO view; the format was fixed by `configure`.
    fn io<S: IoFormat>(&self) -> alsa::pcm::IO<'_, S> {
        // SAFETY: only called with the sample type matching the configured
        // format, and this stream never hands out another IO or mmap view.
        unsafe { self.pcm.io_unchecked::<S>() }
    }
}

impl PcmStream for AlsaPcm {
    fn configure(&mut self, params: &StreamParams) -> Result<(), String> {
        let rate = self.set_hw_params(params).map_err(|e| e.to_string())?;
        if rate != params.sample_rate {
            return Err(format!(
                "device runs at {} Hz, graph runs at {} Hz",
                rate, params.sample_rate
            ));
        }
        self.pcm.prepare().map_err(|e| e.to_string())?;
        self.channels = params.channels;
        self.format = Some(params.format);
        Ok(())
    }

    fn write(&mut self, samples: Interleaved<'_>, frames: usize) -> Result<usize, XferError> {
        let len = frames * self.channels;
        match (samples, self.format) {
            (Interleaved::I16(buf), Some(SampleFormat::S16)) => {
                self.io::<i16>().writei(&buf[..len.min(buf.len())]).map_err(xfer_err)
            }
            (Interleaved::I32(buf), Some(f)) if f != SampleFormat::S16 => {
                self.io::<i32>().writei(&buf[..len.min(buf.len())]).map_err(xfer_err)
            }
            _ => Err(XferError::Errno(libc::EINVAL)),
        }
    }

    fn read(&mut self, samples: InterleavedMut<'_>, frames: usize) -> Result<usize, XferError> {
        let len = frames * self.channels;
        match (samples, self.format) {
            (InterleavedMut::I16(buf), Some(SampleFormat::S16)) => {
                let len = len.min(buf.len());
                self.io::<i16>().readi(&mut buf[..len]).map_err(xfer_err)
            }
            (InterleavedMut::I32(buf), Some(f)) if f != SampleFormat::S16 => {
                let len = len.min(buf.len());
                self.io::<i32>().readi(&mut buf[..len]).map_err(xfer_err)
            }
            _ => Err(XferError::Errno(libc::EINVAL)),
        }
    }

    fn recover(&mut self, err: XferError) -> Result<(), XferError> {
        // only reached for EPIPE; ESTRPIPE would sleep inside alsa-lib
        self.pcm.recover(-errno_of(err), true).map_err(xfer_err)
    }

    fn resume(&mut self) -> Result<Resume, XferError> {
        match self.pcm.resume() {
            Ok(()) => Ok(Resume::Done),
            Err(e) if e.errno().abs() == libc::EAGAIN => Ok(Resume::Pending),
            Err(e) => Err(xfer_err(e)),
        }
    }

    fn prepare(&mut self) -> Result<(), XferError> {
        self.pcm.prepare().map_err(xfer_err)
    }

    fn drain(&mut self) -> Result<(), XferError> {
        self.pcm.drain().map_err(xfer_err)
    }
}
