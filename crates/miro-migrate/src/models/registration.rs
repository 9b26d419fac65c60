//! Registration records
//!
//! A registration links a Miro image to its DLCS image. The DLCS outcome is
//! held as a single [`RegistrationStatus`]; the `batch_successful`,
//! `image_successful` and `image_error` fields seen in stored documents are
//! derived from it when serializing.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// JSON path of the batch id inside a stored registration
pub const BATCH_ID_PATH: &str = "$.dlcs.batch_id";

/// One Miro image to register with DLCS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub miro_id: String,
    /// Origin file for the image, relative to the DLCS origin
    pub file_id: String,
    #[serde(default)]
    pub dlcs: Option<DlcsRegistration>,
}

impl Registration {
    pub fn new(miro_id: impl Into<String>, file_id: impl Into<String>) -> Self {
        Self {
            miro_id: miro_id.into(),
            file_id: file_id.into(),
            dlcs: None,
        }
    }

    pub fn batch_id(&self) -> Option<&str> {
        self.dlcs.as_ref().map(|dlcs| dlcs.batch_id.as_str())
    }
}

/// Outcome of a registration as last observed in DLCS
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationStatus {
    /// Batch submitted, outcome not yet checked
    Pending,
    /// The whole batch finished without errors
    BatchSucceeded,
    /// The batch did not succeed but this image did
    ImageSucceeded,
    Failed { image_error: Option<String> },
}

impl RegistrationStatus {
    /// Status from the three checks made against DLCS, in the order they are
    /// made: batch, then image, then the image's error.
    pub fn from_checks(
        batch_successful: bool,
        image_successful: bool,
        image_error: Option<String>,
    ) -> Self {
        if batch_successful {
            Self::BatchSucceeded
        } else if image_successful {
            Self::ImageSucceeded
        } else {
            Self::Failed { image_error }
        }
    }

    pub fn batch_successful(&self) -> bool {
        matches!(self, Self::BatchSucceeded)
    }

    pub fn image_successful(&self) -> bool {
        matches!(self, Self::BatchSucceeded | Self::ImageSucceeded)
    }

    pub fn image_error(&self) -> Option<&str> {
        match self {
            Self::Failed { image_error } => image_error.as_deref(),
            _ => None,
        }
    }
}

/// DLCS side of a registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DlcsRegistration {
    pub batch_id: String,
    pub image_id: Option<String>,
    pub status: RegistrationStatus,
}

impl DlcsRegistration {
    pub fn submitted(batch_id: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            image_id: None,
            status: RegistrationStatus::Pending,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct DlcsDocument {
    batch_id: String,
    #[serde(default)]
    image_id: Option<String>,
    #[serde(default)]
    batch_successful: Option<bool>,
    #[serde(default)]
    image_successful: Option<bool>,
    #[serde(default)]
    image_error: Option<String>,
}

impl Serialize for DlcsRegistration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let checked = self.status != RegistrationStatus::Pending;
        DlcsDocument {
            batch_id: self.batch_id.clone(),
            image_id: self.image_id.clone(),
            batch_successful: checked.then(|| self.status.batch_successful()),
            image_successful: checked.then(|| self.status.image_successful()),
            image_error: self.status.image_error().map(str::to_string),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DlcsRegistration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let doc = DlcsDocument::deserialize(deserializer)?;
        let status = match (doc.batch_successful, doc.image_successful) {
            (None, None) => RegistrationStatus::Pending,
            (batch, image) => RegistrationStatus::from_checks(
                batch.unwrap_or(false),
                image.unwrap_or(false),
                doc.image_error,
            ),
        };
        Ok(Self {
            batch_id: doc.batch_id,
            image_id: doc.image_id,
            status,
        })
    }
}
