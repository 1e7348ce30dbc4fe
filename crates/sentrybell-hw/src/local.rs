//! Local V4L2 capture device.

use crate::capture::{SourceError, SourceOpener, VideoSource};
use crate::frame::{self, VideoFrame};
use std::path::Path;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const REQUEST_WIDTH: u32 = 640;
const REQUEST_HEIGHT: u32 = 480;

enum LocalFormat {
    Yuyv,
    Grey,
}

/// A V4L2 camera negotiated to YUYV (or GREY for IR-style sensors).
pub struct LocalCamera {
    device: Device,
    width: u32,
    height: u32,
    format: LocalFormat,
    device_path: String,
}

impl LocalCamera {
    pub fn open(device_path: &str) -> Result<Self, SourceError> {
        if !Path::new(device_path).exists() {
            return Err(SourceError::OpenFailed(
                device_path.to_string(),
                "device node not found".into(),
            ));
        }

        let device = Device::with_path(device_path)
            .map_err(|e| SourceError::OpenFailed(device_path.to_string(), e.to_string()))?;

        let caps = device
            .query_caps()
            .map_err(|e| SourceError::OpenFailed(device_path.to_string(), e.to_string()))?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(SourceError::OpenFailed(
                device_path.to_string(),
                "device does not support video capture".into(),
            ));
        }

        let mut fmt = device
            .format()
            .map_err(|e| SourceError::OpenFailed(device_path.to_string(), e.to_string()))?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = REQUEST_WIDTH;
        fmt.height = REQUEST_HEIGHT;

        let negotiated = device
            .set_format(&fmt)
            .map_err(|e| SourceError::OpenFailed(device_path.to_string(), e.to_string()))?;

        let format = if negotiated.fourcc == FourCC::new(b"YUYV") {
            LocalFormat::Yuyv
        } else if negotiated.fourcc == FourCC::new(b"GREY") {
            LocalFormat::Grey
        } else {
            return Err(SourceError::OpenFailed(
                device_path.to_string(),
                format!("unsupported pixel format {:?} (need YUYV or GREY)", negotiated.fourcc),
            ));
        };

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            "local camera opened"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            format,
            device_path: device_path.to_string(),
        })
    }
}

impl VideoSource for LocalCamera {
    fn read_frame(&mut self) -> Result<VideoFrame, SourceError> {
        let mut stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, 4)
            .map_err(|e| SourceError::ReadFailed(format!("mmap stream: {e}")))?;

        let (buf, _meta) = stream
            .next()
            .map_err(|e| SourceError::ReadFailed(format!("dequeue buffer: {e}")))?;

        let image = match self.format {
            LocalFormat::Yuyv => frame::yuyv_to_rgb(buf, self.width, self.height)?,
            LocalFormat::Grey => frame::grey_to_rgb(buf, self.width, self.height)?,
        };

        Ok(VideoFrame { image, sequence: 0 })
    }

    fn release(&mut self) {
        tracing::debug!(device = %self.device_path, "local camera released");
    }
}

/// Opener for a local capture device path.
pub struct LocalOpener {
    pub device_path: String,
}

impl SourceOpener for LocalOpener {
    fn open(&mut self) -> Result<Box<dyn VideoSource>, SourceError> {
        Ok(Box::new(LocalCamera::open(&self.device_path)?))
    }

    fn describe(&self) -> String {
        self.device_path.clone()
    }
}
