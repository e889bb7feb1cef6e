use crate::colorize::{self, CalibrationRange, Colorizer};
use crate::config::Settings;
use crate::error::DecodeError;
use crate::protocol::HEADER_LEN;
use crate::reassembly::CompleteFrame;
use crate::thermal::ThermalDecoder;
use crate::types::{ImageData, ImageStreams, OutputFrame, StreamKind};
use crossbeam_channel::{Receiver, Sender};
use std::time::SystemTime;

/// Receiver of finished images.
pub trait ImageSink {
    fn publish(&mut self, frame: OutputFrame);
}

impl<F: FnMut(OutputFrame)> ImageSink for F {
    fn publish(&mut self, frame: OutputFrame) {
        self(frame)
    }
}

/// Sink that forwards frames over a bounded channel. When the consumer falls
/// behind, new frames are dropped rather than blocking the poll loop.
pub struct ChannelSink {
    sender: Sender<OutputFrame>,
}

impl ChannelSink {
    pub fn bounded(cap: usize) -> (ChannelSink, Receiver<OutputFrame>) {
        let (sender, receiver) = crossbeam_channel::bounded(cap);
        (ChannelSink { sender }, receiver)
    }
}

impl ImageSink for ChannelSink {
    fn publish(&mut self, frame: OutputFrame) {
        if let Err(e) = self.sender.try_send(frame) {
            match e {
                crossbeam_channel::TrySendError::Full(_) => {
                    log::trace!("Image channel full, dropping frame");
                }
                crossbeam_channel::TrySendError::Disconnected(_) => {
                    log::trace!("Image channel disconnected, dropping frame");
                }
            }
        }
    }
}

/// What one dispatch produced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub visual: bool,
    pub thermal: bool,
    pub errors: u32,
}

/// Splits complete frames into visual and thermal outputs.
pub struct FrameDispatcher {
    streams: ImageStreams,
    decoder: ThermalDecoder,
    colorizer: Colorizer,
    calibration: CalibrationRange,
    color: bool,
    frame_id: String,
}

impl FrameDispatcher {
    pub fn new(settings: &Settings) -> Self {
        Self {
            streams: settings.streams,
            decoder: ThermalDecoder::new(settings.resolution),
            colorizer: Colorizer::new(settings.gradient.clone()),
            calibration: settings.calibration,
            color: settings.color,
            frame_id: settings.frame_id.clone(),
        }
    }

    pub fn streams(&self) -> ImageStreams {
        self.streams
    }

    /// Decode the enabled streams of `frame` and publish them. Decode
    /// failures drop only the affected image and are counted in the report.
    pub fn dispatch(
        &self,
        frame: &CompleteFrame<'_>,
        stamp: SystemTime,
        sink: &mut dyn ImageSink,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        if self.streams.contains(ImageStreams::VISUAL) {
            match self.decode_visual(frame) {
                Ok(image) => {
                    sink.publish(self.output(StreamKind::Visual, stamp, image));
                    report.visual = true;
                }
                Err(e) => {
                    log::debug!("Dropping visual image: {}", e);
                    report.errors += 1;
                }
            }
        }

        if self.streams.contains(ImageStreams::THERMAL) {
            match self.decode_thermal(frame) {
                Ok(image) => {
                    sink.publish(self.output(StreamKind::Thermal, stamp, image));
                    report.thermal = true;
                }
                Err(e) => {
                    log::debug!("Dropping thermal image: {}", e);
                    report.errors += 1;
                }
            }
        }

        report
    }

    /// JPEG segment to RGB8. The decoder already yields RGB channel order.
    pub fn decode_visual(&self, frame: &CompleteFrame<'_>) -> Result<ImageData, DecodeError> {
        let jpg = frame.jpg()?;
        let img = image::load_from_memory_with_format(jpg, image::ImageFormat::Jpeg)?;
        Ok(ImageData::Rgb8(img.to_rgb8()))
    }

    /// Samples are addressed from the frame start but must lie inside the
    /// header-declared thermal segment.
    pub fn decode_thermal(&self, frame: &CompleteFrame<'_>) -> Result<ImageData, DecodeError> {
        let segment_end = HEADER_LEN + frame.thermal()?.len();
        let raw = self.decoder.decode(&frame.bytes()[..segment_end])?;
        Ok(if self.color {
            ImageData::Rgb8(self.colorizer.colorize(&raw, &self.calibration))
        } else {
            ImageData::Mono8(colorize::grayscale(&raw, &self.calibration))
        })
    }

    fn output(&self, stream: StreamKind, stamp: SystemTime, image: ImageData) -> OutputFrame {
        OutputFrame {
            stream,
            frame_id: self.frame_id.clone(),
            stamp,
            image,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::Config;
    use crate::protocol::FrameHeader;
    use crate::reassembly::FrameReassembler;
    use crate::thermal::{self, RAW_FRAME_LEN};

    /// 16x8 mid-gray JPEG.
    pub(crate) fn tiny_jpeg() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(16, 8, image::Rgb([128, 128, 128]));
        let mut out = Vec::new();
        image::codecs::jpeg::JpegEncoder::new(&mut out)
            .encode_image(&img)
            .unwrap();
        out
    }

    /// A complete wire frame: header, thermal segment, JPEG, status.
    pub(crate) fn wire_frame(jpg: &[u8]) -> Vec<u8> {
        let thermal_frame = thermal::tests::synthetic_frame();
        let thermal_size = (RAW_FRAME_LEN - 28) as u32;
        let status = [0u8; 16];
        let frame_size = thermal_size + jpg.len() as u32 + status.len() as u32;

        let mut out = FrameHeader {
            frame_size,
            thermal_size,
            jpg_size: jpg.len() as u32,
            status_size: status.len() as u32,
        }
        .to_bytes()
        .to_vec();
        out.extend_from_slice(&thermal_frame[28..]);
        out.extend_from_slice(jpg);
        out.extend_from_slice(&status);
        out
    }

    fn dispatcher(config: Config) -> FrameDispatcher {
        FrameDispatcher::new(&config.validate().unwrap())
    }

    #[test]
    fn test_both_streams_published() {
        let bytes = wire_frame(&tiny_jpeg());
        let mut r = FrameReassembler::default();
        let frame = r.feed(&bytes).unwrap();

        let mut out = Vec::new();
        let stamp = SystemTime::now();
        let mut sink = |f: OutputFrame| out.push(f);
        let report = dispatcher(Config::default()).dispatch(&frame, stamp, &mut sink);

        assert_eq!(
            report,
            DispatchReport {
                visual: true,
                thermal: true,
                errors: 0
            }
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].stream, StreamKind::Visual);
        assert_eq!((out[0].image.width(), out[0].image.height()), (16, 8));
        assert_eq!(out[0].image.encoding(), "rgb8");
        assert_eq!(out[1].stream, StreamKind::Thermal);
        assert_eq!((out[1].image.width(), out[1].image.height()), (80, 60));
        assert_eq!(out[1].image.encoding(), "rgb8");
        assert!(out.iter().all(|f| f.stamp == stamp && f.frame_id == "flir"));
    }

    #[test]
    fn test_mono_native_thermal_only() {
        let bytes = wire_frame(&tiny_jpeg());
        let mut r = FrameReassembler::default();
        let frame = r.feed(&bytes).unwrap();

        let config = Config {
            publish_rgb_image: false,
            ir_img_color: false,
            ir_img_width: 160,
            ir_img_height: 120,
            ..Config::default()
        };
        let mut out = Vec::new();
        let mut sink = |f: OutputFrame| out.push(f);
        let report = dispatcher(config).dispatch(&frame, SystemTime::now(), &mut sink);

        assert!(!report.visual);
        assert!(report.thermal);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].image.encoding(), "mono8");
        assert_eq!(out[0].image.as_bytes().len(), 160 * 120);
    }

    #[test]
    fn test_bad_jpeg_drops_only_visual() {
        let bytes = wire_frame(&[0xFF, 0xD8, 0x00, 0x01, 0x02]);
        let mut r = FrameReassembler::default();
        let frame = r.feed(&bytes).unwrap();

        let mut out = Vec::new();
        let mut sink = |f: OutputFrame| out.push(f);
        let report = dispatcher(Config::default()).dispatch(&frame, SystemTime::now(), &mut sink);

        assert_eq!(report.errors, 1);
        assert!(!report.visual);
        assert!(report.thermal);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].stream, StreamKind::Thermal);
    }

    #[test]
    fn test_short_thermal_segment_is_decode_error() {
        let mut bytes = FrameHeader {
            frame_size: 8,
            thermal_size: 8,
            jpg_size: 0,
            status_size: 0,
        }
        .to_bytes()
        .to_vec();
        bytes.extend([0u8; 8]);
        let mut r = FrameReassembler::default();
        let frame = r.feed(&bytes).unwrap();

        let d = dispatcher(Config {
            publish_rgb_image: false,
            ..Config::default()
        });
        assert!(matches!(
            d.decode_thermal(&frame),
            Err(DecodeError::ThermalTooShort { .. })
        ));
    }

    #[test]
    fn test_thermal_segment_bounds_decode() {
        // Long enough overall, but the thermal segment itself is tiny.
        let mut bytes = FrameHeader {
            frame_size: 40_008,
            thermal_size: 8,
            jpg_size: 40_000,
            status_size: 0,
        }
        .to_bytes()
        .to_vec();
        bytes.extend(std::iter::repeat(0xAB).take(40_008));
        let mut r = FrameReassembler::default();
        let frame = r.feed(&bytes).unwrap();
        assert!(frame.bytes().len() >= RAW_FRAME_LEN);

        let d = dispatcher(Config::default());
        assert!(matches!(
            d.decode_thermal(&frame),
            Err(DecodeError::ThermalTooShort { got: 36, .. })
        ));

        let mut out = Vec::new();
        let mut sink = |f: OutputFrame| out.push(f);
        let report = d.dispatch(&frame, SystemTime::now(), &mut sink);
        assert!(!report.thermal);
        assert!(out.iter().all(|f| f.stream != StreamKind::Thermal));
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (mut sink, rx) = ChannelSink::bounded(1);
        let frame = OutputFrame {
            stream: StreamKind::Thermal,
            frame_id: "flir".into(),
            stamp: SystemTime::UNIX_EPOCH,
            image: ImageData::Mono8(image::GrayImage::new(1, 1)),
        };
        sink.publish(frame.clone());
        sink.publish(frame);
        assert_eq!(rx.len(), 1);
    }
}
