use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ObliqueError;

/// Identifies one crop of one source image: the image id plus the integer
/// pixel the crop is centered on.
///
/// Displays as `"{image_id}_{x}_{y}"`, which is the form the GUI shows and
/// passes back. Parsing splits on the last two underscores so ids that contain
/// `_` survive the round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageName {
    pub image_id: String,
    pub x: i64,
    pub y: i64,
}

impl ImageName {
    pub fn new(image_id: impl Into<String>, x: i64, y: i64) -> Self {
        Self {
            image_id: image_id.into(),
            x,
            y,
        }
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.image_id, self.x, self.y)
    }
}

impl FromStr for ImageName {
    type Err = ObliqueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ObliqueError::InvalidImageName(s.to_string());

        let mut parts = s.rsplitn(3, '_');
        let y = parts.next().ok_or_else(invalid)?;
        let x = parts.next().ok_or_else(invalid)?;
        let image_id = parts.next().ok_or_else(invalid)?;
        if image_id.is_empty() {
            return Err(invalid());
        }

        let x = x.parse::<i64>().map_err(|_| invalid())?;
        let y = y.parse::<i64>().map_err(|_| invalid())?;
        Ok(ImageName::new(image_id, x, y))
    }
}
