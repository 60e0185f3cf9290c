//! X11 connection setup protocol
//!
//! This module handles the initial connection handshake between client and server.
//! The client side only ever produces a [`SetupRequest`] and parses the reply;
//! the reply types can also encode themselves so tests can play the server.

use byteorder::{ByteOrder, LittleEndian};

use super::types::*;
use crate::protocol::{pad, DecodeError, WireBuf, WireReader};

/// Size of the fixed setup packet (no authorization data is sent)
pub const SETUP_REQUEST_LEN: usize = 12;

/// Size of the reply header that precedes the variable part
pub const SETUP_HEADER_LEN: usize = 8;

/// Byte-order marker for least-significant-byte first
pub const LSB_FIRST: u8 = b'l';

/// Connection setup request from client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupRequest {
    pub protocol_major_version: u16,
    pub protocol_minor_version: u16,
}

impl Default for SetupRequest {
    fn default() -> Self {
        SetupRequest {
            protocol_major_version: super::PROTOCOL_MAJOR_VERSION,
            protocol_minor_version: super::PROTOCOL_MINOR_VERSION,
        }
    }
}

impl SetupRequest {
    /// Encode the 12-byte setup packet with empty authorization fields
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = WireBuf::with_capacity(SETUP_REQUEST_LEN);
        buf.put_u8(LSB_FIRST)
            .put_u8(0) // Padding
            .put_u16(self.protocol_major_version)
            .put_u16(self.protocol_minor_version)
            .put_u16(0) // Authorization protocol name length
            .put_u16(0) // Authorization protocol data length
            .put_u16(0); // Padding
        buf.into_vec()
    }

    /// Parse a setup packet as a server would see it
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = WireReader::new(bytes);
        if reader.u8()? != LSB_FIRST {
            return Err(DecodeError::Invalid("byte-order marker"));
        }
        reader.skip(1)?;
        let protocol_major_version = reader.u16()?;
        let protocol_minor_version = reader.u16()?;
        let name_len = reader.u16()? as usize;
        let data_len = reader.u16()? as usize;
        reader.skip(2)?;
        reader.skip(name_len + pad(name_len) + data_len + pad(data_len))?;
        Ok(SetupRequest {
            protocol_major_version,
            protocol_minor_version,
        })
    }
}

/// Setup response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStatus {
    Failed = 0,
    Success = 1,
    Authenticate = 2,
}

impl SetupStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SetupStatus::Failed),
            1 => Some(SetupStatus::Success),
            2 => Some(SetupStatus::Authenticate),
            _ => None,
        }
    }
}

/// The fixed 8 bytes every setup reply starts with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupHeader {
    pub status: u8,
    /// Reason length for failures, unused on success
    pub reason_len: u8,
    pub protocol_major_version: u16,
    pub protocol_minor_version: u16,
    /// Length of the rest of the reply in 4-byte units
    pub additional_words: u16,
}

impl SetupHeader {
    pub fn parse(bytes: &[u8; SETUP_HEADER_LEN]) -> Self {
        SetupHeader {
            status: bytes[0],
            reason_len: bytes[1],
            protocol_major_version: LittleEndian::read_u16(&bytes[2..4]),
            protocol_minor_version: LittleEndian::read_u16(&bytes[4..6]),
            additional_words: LittleEndian::read_u16(&bytes[6..8]),
        }
    }

    /// Number of bytes still to be read after the header
    pub fn additional_len(&self) -> usize {
        self.additional_words as usize * 4
    }
}

/// Format information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    pub depth: u8,
    pub bits_per_pixel: u8,
    pub scanline_pad: u8,
}

impl Format {
    pub fn encode(&self, buf: &mut WireBuf) {
        buf.put_u8(self.depth)
            .put_u8(self.bits_per_pixel)
            .put_u8(self.scanline_pad)
            .put_zeros(5); // Padding
    }
}

/// Visual type information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualType {
    pub visual_id: VisualID,
    pub class: u8,
    pub bits_per_rgb_value: u8,
    pub colormap_entries: u16,
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,
}

impl VisualType {
    fn parse(reader: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        let visual = VisualType {
            visual_id: VisualID::new(reader.u32()?),
            class: reader.u8()?,
            bits_per_rgb_value: reader.u8()?,
            colormap_entries: reader.u16()?,
            red_mask: reader.u32()?,
            green_mask: reader.u32()?,
            blue_mask: reader.u32()?,
        };
        reader.skip(4)?;
        Ok(visual)
    }

    pub fn encode(&self, buf: &mut WireBuf) {
        buf.put_u32(self.visual_id.get())
            .put_u8(self.class)
            .put_u8(self.bits_per_rgb_value)
            .put_u16(self.colormap_entries)
            .put_u32(self.red_mask)
            .put_u32(self.green_mask)
            .put_u32(self.blue_mask)
            .put_zeros(4); // Padding
    }
}

/// Depth information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Depth {
    pub depth: u8,
    pub visuals: Vec<VisualType>,
}

impl Depth {
    fn parse(reader: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        let depth = reader.u8()?;
        reader.skip(1)?;
        let count = reader.u16()?;
        reader.skip(4)?;
        let visuals = (0..count)
            .map(|_| VisualType::parse(reader))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Depth { depth, visuals })
    }

    pub fn encode(&self, buf: &mut WireBuf) {
        buf.put_u8(self.depth)
            .put_u8(0) // Padding
            .put_u16(self.visuals.len() as u16)
            .put_zeros(4); // Padding

        for visual in &self.visuals {
            visual.encode(buf);
        }
    }
}

/// Screen information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub root: Window,
    pub default_colormap: u32,
    pub white_pixel: u32,
    pub black_pixel: u32,
    pub current_input_masks: u32,
    pub width_in_pixels: u16,
    pub height_in_pixels: u16,
    pub width_in_millimeters: u16,
    pub height_in_millimeters: u16,
    pub min_installed_maps: u16,
    pub max_installed_maps: u16,
    pub root_visual: VisualID,
    pub backing_stores: u8,
    pub save_unders: bool,
    pub root_depth: u8,
    pub allowed_depths: Vec<Depth>,
}

impl Screen {
    /// Parse one screen record. Field offsets relative to the record start:
    /// root +0, white pixel +8, black pixel +12, root visual +32, root depth +38.
    fn parse(reader: &mut WireReader<'_>) -> Result<Self, DecodeError> {
        let root = Window::new(reader.u32()?);
        let default_colormap = reader.u32()?;
        let white_pixel = reader.u32()?;
        let black_pixel = reader.u32()?;
        let current_input_masks = reader.u32()?;
        let width_in_pixels = reader.u16()?;
        let height_in_pixels = reader.u16()?;
        let width_in_millimeters = reader.u16()?;
        let height_in_millimeters = reader.u16()?;
        let min_installed_maps = reader.u16()?;
        let max_installed_maps = reader.u16()?;
        let root_visual = VisualID::new(reader.u32()?);
        let backing_stores = reader.u8()?;
        let save_unders = reader.u8()? != 0;
        let root_depth = reader.u8()?;
        let depth_count = reader.u8()?;
        let allowed_depths = (0..depth_count)
            .map(|_| Depth::parse(reader))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Screen {
            root,
            default_colormap,
            white_pixel,
            black_pixel,
            current_input_masks,
            width_in_pixels,
            height_in_pixels,
            width_in_millimeters,
            height_in_millimeters,
            min_installed_maps,
            max_installed_maps,
            root_visual,
            backing_stores,
            save_unders,
            root_depth,
            allowed_depths,
        })
    }

    pub fn encode(&self, buf: &mut WireBuf) {
        buf.put_u32(self.root.id().get())
            .put_u32(self.default_colormap)
            .put_u32(self.white_pixel)
            .put_u32(self.black_pixel)
            .put_u32(self.current_input_masks)
            .put_u16(self.width_in_pixels)
            .put_u16(self.height_in_pixels)
            .put_u16(self.width_in_millimeters)
            .put_u16(self.height_in_millimeters)
            .put_u16(self.min_installed_maps)
            .put_u16(self.max_installed_maps)
            .put_u32(self.root_visual.get())
            .put_u8(self.backing_stores)
            .put_u8(u8::from(self.save_unders))
            .put_u8(self.root_depth)
            .put_u8(self.allowed_depths.len() as u8);

        for depth in &self.allowed_depths {
            depth.encode(buf);
        }
    }
}

/// Setup reply (success case)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupSuccess {
    pub protocol_major_version: u16,
    pub protocol_minor_version: u16,
    pub release_number: u32,
    pub resource_id_base: u32,
    pub resource_id_mask: u32,
    pub motion_buffer_size: u32,
    /// Longest request the server accepts, in 4-byte units
    pub maximum_request_length: u16,
    pub image_byte_order: u8,
    pub bitmap_format_bit_order: u8,
    pub bitmap_format_scanline_unit: u8,
    pub bitmap_format_scanline_pad: u8,
    pub min_keycode: u8,
    pub max_keycode: u8,
    pub vendor: String,
    pub pixmap_formats: Vec<Format>,
    pub roots: Vec<Screen>,
}

impl SetupSuccess {
    /// Parse the variable part of a successful reply.
    ///
    /// `data` is everything after the 8-byte header. The screens start after
    /// the vendor string (rounded up to a word) and the 8-byte pixmap formats.
    pub fn parse(header: &SetupHeader, data: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = WireReader::new(data);
        let release_number = reader.u32()?;
        let resource_id_base = reader.u32()?;
        let resource_id_mask = reader.u32()?;
        let motion_buffer_size = reader.u32()?;
        let vendor_len = reader.u16()? as usize;
        let maximum_request_length = reader.u16()?;
        let screen_count = reader.u8()?;
        let format_count = reader.u8()?;
        let image_byte_order = reader.u8()?;
        let bitmap_format_bit_order = reader.u8()?;
        let bitmap_format_scanline_unit = reader.u8()?;
        let bitmap_format_scanline_pad = reader.u8()?;
        let min_keycode = reader.u8()?;
        let max_keycode = reader.u8()?;
        reader.skip(4)?;

        let vendor_bytes = reader.bytes(vendor_len)?;
        let vendor = String::from_utf8_lossy(vendor_bytes).into_owned();
        reader.skip(pad(vendor_len))?;

        let mut pixmap_formats = Vec::with_capacity(format_count as usize);
        for _ in 0..format_count {
            let depth = reader.u8()?;
            let bits_per_pixel = reader.u8()?;
            let scanline_pad = reader.u8()?;
            reader.skip(5)?;
            pixmap_formats.push(Format {
                depth,
                bits_per_pixel,
                scanline_pad,
            });
        }

        let roots = (0..screen_count)
            .map(|_| Screen::parse(&mut reader))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SetupSuccess {
            protocol_major_version: header.protocol_major_version,
            protocol_minor_version: header.protocol_minor_version,
            release_number,
            resource_id_base,
            resource_id_mask,
            motion_buffer_size,
            maximum_request_length,
            image_byte_order,
            bitmap_format_bit_order,
            bitmap_format_scanline_unit,
            bitmap_format_scanline_pad,
            min_keycode,
            max_keycode,
            vendor,
            pixmap_formats,
            roots,
        })
    }

    /// First screen, which is the one windows are created on
    pub fn default_screen(&self) -> Option<&Screen> {
        self.roots.first()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = WireBuf::new();

        buf.put_u8(SetupStatus::Success as u8)
            .put_u8(0) // Unused
            .put_u16(self.protocol_major_version)
            .put_u16(self.protocol_minor_version)
            .put_u16(0); // Length placeholder, patched below

        buf.put_u32(self.release_number)
            .put_u32(self.resource_id_base)
            .put_u32(self.resource_id_mask)
            .put_u32(self.motion_buffer_size)
            .put_u16(self.vendor.len() as u16)
            .put_u16(self.maximum_request_length)
            .put_u8(self.roots.len() as u8)
            .put_u8(self.pixmap_formats.len() as u8)
            .put_u8(self.image_byte_order)
            .put_u8(self.bitmap_format_bit_order)
            .put_u8(self.bitmap_format_scanline_unit)
            .put_u8(self.bitmap_format_scanline_pad)
            .put_u8(self.min_keycode)
            .put_u8(self.max_keycode)
            .put_zeros(4); // Padding

        buf.put_bytes(self.vendor.as_bytes()).pad_to_word();

        for format in &self.pixmap_formats {
            format.encode(&mut buf);
        }

        for screen in &self.roots {
            screen.encode(&mut buf);
        }

        // Length in 4-byte units, excluding the 8-byte header
        let mut bytes = buf.into_vec();
        let length = ((bytes.len() - SETUP_HEADER_LEN) / 4) as u16;
        bytes[6..8].copy_from_slice(&length.to_le_bytes());
        bytes
    }
}

/// Setup failed (or authenticate) response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupFailed {
    pub status: u8,
    pub protocol_major_version: u16,
    pub protocol_minor_version: u16,
    pub reason: String,
}

impl SetupFailed {
    /// Failure replies carry the reason length in header byte 1. Authenticate
    /// replies do not, so the whole payload is taken with NULs trimmed.
    pub fn parse(header: &SetupHeader, data: &[u8]) -> Self {
        let reason = if header.status == SetupStatus::Failed as u8 {
            &data[..(header.reason_len as usize).min(data.len())]
        } else {
            data
        };
        SetupFailed {
            status: header.status,
            protocol_major_version: header.protocol_major_version,
            protocol_minor_version: header.protocol_minor_version,
            reason: String::from_utf8_lossy(reason)
                .trim_end_matches('\0')
                .to_string(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = WireBuf::new();
        buf.put_u8(self.status)
            .put_u8(self.reason.len() as u8)
            .put_u16(self.protocol_major_version)
            .put_u16(self.protocol_minor_version)
            .put_u16(crate::protocol::padded_len(self.reason.len()) as u16 / 4)
            .put_bytes(self.reason.as_bytes())
            .pad_to_word();
        buf.into_vec()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A plausible reply with one 24-bit TrueColor screen.
    pub(crate) fn sample_setup() -> SetupSuccess {
        SetupSuccess {
            protocol_major_version: 11,
            protocol_minor_version: 0,
            release_number: 12_101_004,
            resource_id_base: 0x0440_0000,
            resource_id_mask: 0x001f_ffff,
            motion_buffer_size: 256,
            maximum_request_length: 65535,
            image_byte_order: 0,
            bitmap_format_bit_order: 0,
            bitmap_format_scanline_unit: 32,
            bitmap_format_scanline_pad: 32,
            min_keycode: 8,
            max_keycode: 255,
            vendor: "The X.Org Foundation".to_string(),
            pixmap_formats: vec![
                Format {
                    depth: 1,
                    bits_per_pixel: 1,
                    scanline_pad: 32,
                },
                Format {
                    depth: 24,
                    bits_per_pixel: 32,
                    scanline_pad: 32,
                },
            ],
            roots: vec![Screen {
                root: Window::new(0x0000_0536),
                default_colormap: 0x21,
                white_pixel: 0x00ff_ffff,
                black_pixel: 0,
                current_input_masks: 0,
                width_in_pixels: 1920,
                height_in_pixels: 1080,
                width_in_millimeters: 508,
                height_in_millimeters: 285,
                min_installed_maps: 1,
                max_installed_maps: 1,
                root_visual: VisualID::new(0x21),
                backing_stores: 0,
                save_unders: false,
                root_depth: 24,
                allowed_depths: vec![Depth {
                    depth: 24,
                    visuals: vec![VisualType {
                        visual_id: VisualID::new(0x21),
                        class: 4,
                        bits_per_rgb_value: 8,
                        colormap_entries: 256,
                        red_mask: 0x00ff_0000,
                        green_mask: 0x0000_ff00,
                        blue_mask: 0x0000_00ff,
                    }],
                }],
            }],
        }
    }

    fn split(bytes: &[u8]) -> (SetupHeader, &[u8]) {
        let mut header = [0u8; SETUP_HEADER_LEN];
        header.copy_from_slice(&bytes[..SETUP_HEADER_LEN]);
        (SetupHeader::parse(&header), &bytes[SETUP_HEADER_LEN..])
    }

    #[test]
    fn test_setup_request_layout() {
        let bytes = SetupRequest::default().encode();
        assert_eq!(bytes.len(), SETUP_REQUEST_LEN);
        assert_eq!(bytes, vec![b'l', 0, 11, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(SetupRequest::parse(&bytes).unwrap(), SetupRequest::default());
    }

    #[test]
    fn test_parse_success_reply() {
        let expected = sample_setup();
        let bytes = expected.encode();
        let (header, data) = split(&bytes);

        assert_eq!(header.status, SetupStatus::Success as u8);
        assert_eq!(header.additional_len(), data.len());

        let parsed = SetupSuccess::parse(&header, data).unwrap();
        let screen = parsed.default_screen().unwrap();
        assert_eq!(parsed.resource_id_base, 0x0440_0000);
        assert_eq!(parsed.resource_id_mask, 0x001f_ffff);
        assert_eq!(parsed.vendor, "The X.Org Foundation");
        assert_eq!(screen.root, Window::new(0x536));
        assert_eq!(screen.root_visual, VisualID::new(0x21));
        assert_eq!(screen.root_depth, 24);
        assert_eq!(screen.white_pixel, 0x00ff_ffff);
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_vendor_length_is_rounded_up() {
        // 21 bytes of vendor forces three bytes of padding before the formats
        let mut setup = sample_setup();
        setup.vendor = "A vendor of 21 bytes!".to_string();
        let bytes = setup.encode();
        let (header, data) = split(&bytes);
        let parsed = SetupSuccess::parse(&header, data).unwrap();
        assert_eq!(parsed.roots[0].root_depth, 24);
        assert_eq!(parsed.pixmap_formats.len(), 2);
    }

    #[test]
    fn test_truncated_reply_is_an_error() {
        let bytes = sample_setup().encode();
        let (header, data) = split(&bytes);
        let short = &data[..data.len() - 20];
        assert!(matches!(
            SetupSuccess::parse(&header, short),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_failed_reply_reason() {
        let failed = SetupFailed {
            status: SetupStatus::Failed as u8,
            protocol_major_version: 11,
            protocol_minor_version: 0,
            reason: "No protocol specified".to_string(),
        };
        let bytes = failed.encode();
        assert_eq!(bytes.len() % 4, 0);
        let (header, data) = split(&bytes);
        assert_eq!(SetupFailed::parse(&header, data), failed);
    }
}
