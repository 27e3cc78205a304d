use nom::bytes::complete::tag;
use nom::multi::length_data;
use nom::number::complete::be_u8;
use nom::sequence::tuple;
use nom::IResult;
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::error::{Error, Result};
use crate::protocol::checksum;
use crate::protocol::encoding::{claim, Encodable};

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive, IntoPrimitive)]
pub enum DataType {
    SetRequest = 0x41,
    GetInfoRequest = 0x42,
    ConnectRequest = 0x5a,

    SetResponse = 0x61,
    GetInfoResponse = 0x62,
    ConnectResponse = 0x7a,

    #[num_enum(default)]
    Unknown = 0xff,
}

impl DataType {
    pub fn is_connect(self) -> bool {
        matches!(self, DataType::ConnectRequest | DataType::ConnectResponse)
    }
}

pub const FRAME_START: u8 = 0xfc;
const FRAME_B3: u8 = 0x01;
const FRAME_B4: u8 = 0x30;

pub const HEADER_LEN: usize = 5;
pub const MAX_DATA_LEN: usize = 26;
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_DATA_LEN + 1;

/// One CN105 packet, borrowing its data from the receive buffer.
#[derive(Debug, Eq, PartialEq)]
pub struct Frame<'a> {
    pub data_type: DataType,
    type_byte: u8,
    pub data: &'a [u8],
    checksum: u8,
}

impl<'a> Frame<'a> {
    pub fn new(data_type: DataType, data: &'a [u8]) -> Self {
        let type_byte = data_type.into();
        Frame { data_type, type_byte, data, checksum: Self::checksum(type_byte, data) }
    }

    /// Negated sum of everything after the start byte.
    pub fn checksum(type_byte: u8, data: &[u8]) -> u8 {
        let header = checksum::additive(&[type_byte, FRAME_B3, FRAME_B4, data.len() as u8]);
        header.wrapping_add(checksum::additive(data)).wrapping_neg()
    }

    pub fn received_checksum(&self) -> u8 {
        self.checksum
    }

    pub fn calculated_checksum(&self) -> u8 {
        Self::checksum(self.type_byte, self.data)
    }

    pub fn validate_checksum(&self) -> bool {
        self.checksum == self.calculated_checksum()
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], Frame<'a>> {
        let (input, (_, type_byte, _)) = tuple((
            tag(&[FRAME_START][..]),
            be_u8,
            tag(&[FRAME_B3, FRAME_B4][..]),
        ))(input)?;
        let (input, data) = length_data(be_u8)(input)?;
        let (input, checksum) = be_u8(input)?;
        Ok((input, Frame { data_type: DataType::from(type_byte), type_byte, data, checksum }))
    }

    /// Parses a complete packet, rejecting trailing or missing bytes.
    pub fn parse_complete(input: &'a [u8]) -> Result<Frame<'a>> {
        match Self::parse(input) {
            Ok((rest, frame)) if rest.is_empty() => Ok(frame),
            _ => Err(Error::InvalidData),
        }
    }

    /// Raw type byte, for reporting packet types this crate has no name for.
    pub fn type_byte(&self) -> u8 {
        self.type_byte
    }
}

impl Encodable for Frame<'_> {
    fn encoded_len(&self) -> usize {
        HEADER_LEN + self.data.len() + 1
    }

    fn encode<'b>(&self, into: &'b mut [u8]) -> Result<&'b [u8]> {
        if self.data.len() > MAX_DATA_LEN {
            return Err(Error::InvalidParameters);
        }
        let len = self.encoded_len();
        let out = claim(into, len)?;
        out[..HEADER_LEN].copy_from_slice(&[
            FRAME_START,
            self.type_byte,
            FRAME_B3,
            FRAME_B4,
            self.data.len() as u8,
        ]);
        out[HEADER_LEN..len - 1].copy_from_slice(self.data);
        out[len - 1] = self.checksum;
        Ok(out)
    }
}
