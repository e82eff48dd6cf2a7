//! Builders for small but valid FIT files and zip archives used by the tests.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Seconds between the Unix epoch and the FIT epoch (1989-12-31T00:00:00Z).
pub const FIT_EPOCH_OFFSET: i64 = 631_065_600;

const PROTOCOL_VERSION: u8 = 0x10;
const PROFILE_VERSION: u16 = 2093;

const MESG_FILE_ID: u16 = 0;
const MESG_SESSION: u16 = 18;
const MESG_RECORD: u16 = 20;

const BASE_ENUM: u8 = 0x00;
const BASE_UINT8: u8 = 0x02;
const BASE_UINT32: u8 = 0x86;

const FILE_TYPE_ACTIVITY: u8 = 4;

const CRC_TABLE: [u16; 16] = [
    0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401, 0xA001, 0x6C00, 0x7800,
    0xB401, 0x5000, 0x9C01, 0x8801, 0x4400,
];

pub fn fit_datetime(fit_seconds: u32) -> DateTime<Utc> {
    Utc.timestamp_opt(FIT_EPOCH_OFFSET + i64::from(fit_seconds), 0)
        .single()
        .expect("valid FIT timestamp")
}

pub fn to_fit_seconds(timestamp: DateTime<Utc>) -> u32 {
    u32::try_from(timestamp.timestamp() - FIT_EPOCH_OFFSET).expect("timestamp after FIT epoch")
}

fn crc16(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |mut crc, &byte| {
        for nibble in [byte & 0x0F, byte >> 4] {
            let tmp = CRC_TABLE[(crc & 0x0F) as usize];
            crc = (crc >> 4) & 0x0FFF;
            crc ^= tmp ^ CRC_TABLE[nibble as usize];
        }
        crc
    })
}

#[derive(Default)]
struct FitEncoder {
    data: Vec<u8>,
}

impl FitEncoder {
    fn define(&mut self, local: u8, global: u16, fields: &[(u8, u8, u8)]) {
        self.data.push(0x40 | local);
        self.data.push(0); // reserved
        self.data.push(0); // little endian
        self.data.extend_from_slice(&global.to_le_bytes());
        self.data.push(fields.len() as u8);
        for &(number, size, base_type) in fields {
            self.data.extend_from_slice(&[number, size, base_type]);
        }
    }

    fn message(&mut self, local: u8, payload: &[u8]) {
        self.data.push(local);
        self.data.extend_from_slice(payload);
    }

    fn finish(self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.data.len() + 16);
        bytes.push(14);
        bytes.push(PROTOCOL_VERSION);
        bytes.extend_from_slice(&PROFILE_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(b".FIT");
        let header_crc = crc16(&bytes);
        bytes.extend_from_slice(&header_crc.to_le_bytes());

        bytes.extend_from_slice(&self.data);
        let file_crc = crc16(&bytes);
        bytes.extend_from_slice(&file_crc.to_le_bytes());
        bytes
    }
}

/// Raw field values of a `session` message, in FIT units.
#[derive(Debug, Clone)]
pub struct TestSession {
    pub start_time: u32,
    pub elapsed_ms: u32,
    pub distance_cm: u32,
    pub avg_hr: u8,
    pub max_hr: u8,
    pub sport: u8,
    pub sub_sport: u8,
}

fn encode(
    time_created: Option<u32>,
    record_timestamps: &[u32],
    session: Option<&TestSession>,
) -> Vec<u8> {
    let mut encoder = FitEncoder::default();

    match time_created {
        Some(created) => {
            encoder.define(0, MESG_FILE_ID, &[(0, 1, BASE_ENUM), (4, 4, BASE_UINT32)]);
            let mut payload = vec![FILE_TYPE_ACTIVITY];
            payload.extend_from_slice(&created.to_le_bytes());
            encoder.message(0, &payload);
        }
        None => {
            encoder.define(0, MESG_FILE_ID, &[(0, 1, BASE_ENUM)]);
            encoder.message(0, &[FILE_TYPE_ACTIVITY]);
        }
    }

    if !record_timestamps.is_empty() {
        // timestamp (253) and heart_rate (3)
        encoder.define(1, MESG_RECORD, &[(253, 4, BASE_UINT32), (3, 1, BASE_UINT8)]);
        for ts in record_timestamps {
            let mut payload = ts.to_le_bytes().to_vec();
            payload.push(120);
            encoder.message(1, &payload);
        }
    }

    if let Some(session) = session {
        encoder.define(
            2,
            MESG_SESSION,
            &[
                (2, 4, BASE_UINT32),
                (7, 4, BASE_UINT32),
                (9, 4, BASE_UINT32),
                (16, 1, BASE_UINT8),
                (17, 1, BASE_UINT8),
                (5, 1, BASE_ENUM),
                (6, 1, BASE_ENUM),
            ],
        );
        let mut payload = session.start_time.to_le_bytes().to_vec();
        payload.extend_from_slice(&session.elapsed_ms.to_le_bytes());
        payload.extend_from_slice(&session.distance_cm.to_le_bytes());
        payload.extend_from_slice(&[session.avg_hr, session.max_hr, session.sport, session.sub_sport]);
        encoder.message(2, &payload);
    }

    encoder.finish()
}

/// An activity file whose `record` messages carry the given FIT-epoch seconds.
pub fn fit_file_bytes(record_timestamps: &[u32]) -> Vec<u8> {
    encode(None, record_timestamps, None)
}

/// Same as [`fit_file_bytes`] with a `file_id.time_created` field as well.
pub fn fit_file_with_creation_time(time_created: u32, record_timestamps: &[u32]) -> Vec<u8> {
    encode(Some(time_created), record_timestamps, None)
}

/// Records followed by one `session` message.
pub fn fit_file_with_session(record_timestamps: &[u32], session: &TestSession) -> Vec<u8> {
    encode(None, record_timestamps, Some(session))
}

pub fn fit_file_at(timestamps: &[DateTime<Utc>]) -> Vec<u8> {
    let seconds: Vec<u32> = timestamps.iter().map(|ts| to_fit_seconds(*ts)).collect();
    fit_file_bytes(&seconds)
}

pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) -> io::Result<()> {
    let mut writer = ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for (name, bytes) in entries {
        writer.start_file(*name, options).map_err(io::Error::other)?;
        writer.write_all(bytes)?;
    }

    writer.finish().map_err(io::Error::other)?;
    Ok(())
}
