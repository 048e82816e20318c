/*!
 # Persisted user banks

 The user banks are stored as a fixed 416-byte image, laid out the way the
 device keeps them in non-volatile memory:

 * 32 schedule records of 5 bytes, one packed change point per byte
   (bits 0-5 time, bits 6-7 period). Unused trailing entries have time 0.
   A record whose first entry does not have time 0 (such as erased `0xff`
   memory) is an undefined schedule.
 * 64 season records of 4 bytes: start month, start day, workday schedule
   id, holiday schedule id. A month outside 1-12 marks an undefined season;
   the list ends at the first one.
*/

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::period::ChangePoint;
use crate::schedule::{Schedule, MAX_CHANGE_POINTS, USER_SCHEDULES};
use crate::season::{Season, USER_SEASONS};
use crate::{Error, Result};

/// Bytes per schedule record
pub const SCHEDULE_RECORD_LEN: usize = MAX_CHANGE_POINTS;

/// Bytes per season record
pub const SEASON_RECORD_LEN: usize = 4;

/// Total image size
pub const IMAGE_LEN: usize = USER_SCHEDULES * SCHEDULE_RECORD_LEN + USER_SEASONS * SEASON_RECORD_LEN;

const ERASED: u8 = 0xff;

/// Contents of both user banks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserImage {
    pub schedules: [Option<Schedule>; USER_SCHEDULES],
    pub seasons: [Option<Season>; USER_SEASONS],
}

impl Default for UserImage {
    fn default() -> Self {
        Self {
            schedules: std::array::from_fn(|_| None),
            seasons: [None; USER_SEASONS],
        }
    }
}

impl UserImage {
    /// Packs both banks into the persisted layout
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(IMAGE_LEN);

        for schedule in &self.schedules {
            let mut record = [ERASED; SCHEDULE_RECORD_LEN];
            if let Some(schedule) = schedule {
                record = [0; SCHEDULE_RECORD_LEN];
                for (byte, point) in record.iter_mut().zip(schedule.points()) {
                    *byte = point.pack();
                }
            }
            bytes.extend_from_slice(&record);
        }

        for season in &self.seasons {
            match season {
                Some(season) => {
                    bytes.extend_from_slice(&[season.month, season.day, season.workday, season.holiday])
                }
                None => bytes.extend_from_slice(&[0; SEASON_RECORD_LEN]),
            }
        }

        bytes
    }

    /// Unpacks an image. Values are taken as stored; use
    /// [`crate::RateCalendar::check`] to validate them.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != IMAGE_LEN {
            return Err(Error::InvalidImage(format!(
                "expected {} bytes, got {}",
                IMAGE_LEN,
                bytes.len()
            )));
        }

        let (schedule_bytes, season_bytes) = bytes.split_at(USER_SCHEDULES * SCHEDULE_RECORD_LEN);
        let mut image = Self::default();

        for (slot, record) in image
            .schedules
            .iter_mut()
            .zip(schedule_bytes.chunks_exact(SCHEDULE_RECORD_LEN))
        {
            *slot = decode_schedule(record)?;
        }

        for (slot, record) in image
            .seasons
            .iter_mut()
            .zip(season_bytes.chunks_exact(SEASON_RECORD_LEN))
        {
            if (1..=12).contains(&record[0]) {
                *slot = Some(Season {
                    month: record[0],
                    day: record[1],
                    workday: record[2],
                    holiday: record[3],
                });
            }
        }

        Ok(image)
    }
}

fn decode_schedule(record: &[u8]) -> Result<Option<Schedule>> {
    // Time 0 in the first entry is what marks a defined schedule
    if record[0] & 0x3f != 0 {
        return Ok(None);
    }

    let mut points = Vec::with_capacity(MAX_CHANGE_POINTS);
    points.push(ChangePoint::unpack(record[0])?);
    for &byte in &record[1..] {
        let point = ChangePoint::unpack(byte)?;
        if point.time == 0 {
            break;
        }
        points.push(point);
    }

    Ok(Some(Schedule::from_raw(&points)))
}

/// Loads and saves the user image at a file path
#[derive(Debug, Clone)]
pub struct ImageStore {
    path: PathBuf,
}

impl ImageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the image from disk.
    ///
    /// Returns empty banks if the file doesn't exist.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<UserImage> {
        if !self.path.exists() {
            info!(
                "No user image at {}, using built-in rate plan",
                self.path.display()
            );
            return Ok(UserImage::default());
        }

        let bytes = fs::read(&self.path)?;
        let image = UserImage::decode(&bytes)?;
        debug!(
            "Loaded user image: {} schedules, {} seasons",
            image.schedules.iter().flatten().count(),
            image.seasons.iter().flatten().count()
        );
        Ok(image)
    }

    /// Saves the image to disk, through a temporary file and a rename
    #[instrument(skip(self, image), fields(path = %self.path.display()))]
    pub fn save(&self, image: &UserImage) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, image.encode())?;
        fs::rename(&temp_path, &self.path)?;

        info!("Saved user image to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::PeriodKind;
    use crate::RateCalendar;
    use tempfile::tempdir;

    fn sample_image() -> UserImage {
        let mut calendar = RateCalendar::new();
        calendar.define_schedule(0, PeriodKind::OffPeak).unwrap();
        calendar.add_period_change(0, 14, 0, PeriodKind::OnPeak).unwrap();
        calendar.add_period_change(0, 21, 0, PeriodKind::PartialPeak).unwrap();
        calendar.define_schedule(2, PeriodKind::PartialPeak).unwrap();
        calendar.define_season(0, 5, 1, 0, 2).unwrap();
        calendar.define_season(1, 11, 1, 2, 2).unwrap();
        calendar.user_image()
    }

    #[test]
    fn encode_lays_out_records() {
        let bytes = sample_image().encode();
        assert_eq!(bytes.len(), IMAGE_LEN);
        assert_eq!(&bytes[0..5], &[0x00, 0x9c, 0x6a, 0x00, 0x00]);
        assert_eq!(&bytes[5..10], &[0xff; 5]);
        assert_eq!(&bytes[10..15], &[0x40, 0x00, 0x00, 0x00, 0x00]);

        let seasons = &bytes[USER_SCHEDULES * SCHEDULE_RECORD_LEN..];
        assert_eq!(&seasons[0..8], &[5, 1, 0, 2, 11, 1, 2, 2]);
        assert_eq!(&seasons[8..12], &[0, 0, 0, 0]);
    }

    #[test]
    fn decode_restores_encoded_banks() {
        let image = sample_image();
        assert_eq!(UserImage::decode(&image.encode()).unwrap(), image);
    }

    #[test]
    fn erased_image_is_empty() {
        let image = UserImage::decode(&[0xff; IMAGE_LEN]).unwrap();
        assert_eq!(image, UserImage::default());
    }

    #[test]
    fn decode_rejects_wrong_length_and_bad_periods() {
        assert!(UserImage::decode(&[0; 10]).is_err());

        let mut bytes = vec![0xff; IMAGE_LEN];
        bytes[0..5].copy_from_slice(&[0x00, 0xdc, 0, 0, 0]);
        assert!(matches!(UserImage::decode(&bytes), Err(Error::InvalidImage(_))));
    }

    #[test]
    fn missing_file_loads_empty_banks() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("missing.img"));
        assert_eq!(store.load().unwrap(), UserImage::default());
    }

    #[test]
    fn save_and_load() {
        let dir = tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("nvram").join("rates.img"));
        let image = sample_image();

        store.save(&image).unwrap();
        assert_eq!(fs::metadata(store.path()).unwrap().len(), IMAGE_LEN as u64);
        assert_eq!(store.load().unwrap(), image);
    }
}
