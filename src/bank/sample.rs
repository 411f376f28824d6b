use std::sync::Arc;

/// `sfSampleType` bit marking compressed sample data.
pub const SAMPLE_TYPE_COMPRESSED: u16 = 0x10;

/// Sample header plus its decoded mono PCM.
///
/// Offsets index the bank's shared sample blob. Loop points are kept absolute
/// and exposed relative to `start` once decoded.
#[derive(Debug, Clone)]
pub struct Sample {
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub sample_rate: u32,
    pub root_key: u8,
    pub pitch_correction: i8,
    pub link: u16,
    pub compressed: bool,
    pcm: Option<Arc<[f32]>>,
}

impl Sample {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        start: u32,
        end: u32,
        loop_start: u32,
        loop_end: u32,
        sample_rate: u32,
        root_key: u8,
        pitch_correction: i8,
        link: u16,
        sample_type: u16,
    ) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            loop_start,
            loop_end,
            sample_rate,
            root_key,
            pitch_correction,
            link,
            compressed: sample_type & SAMPLE_TYPE_COMPRESSED != 0,
            pcm: None,
        }
    }

    /// Length according to the header. For compressed samples this counts
    /// encoded data, not frames.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) as usize
    }

    /// Playable frames: the decoded PCM once present, the header length before.
    pub fn frame_count(&self) -> usize {
        self.pcm.as_ref().map_or_else(|| self.len(), |pcm| pcm.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// End-of-samples markers and zero-length samples are never played.
    pub fn is_terminator(&self) -> bool {
        self.len() < 1 || self.name.trim_end_matches('\0') == "EOS"
    }

    /// Loop points relative to the first frame of the decoded PCM.
    pub fn loop_range(&self) -> (usize, usize) {
        (
            self.loop_start.saturating_sub(self.start) as usize,
            self.loop_end.saturating_sub(self.start) as usize,
        )
    }

    pub fn pcm(&self) -> Option<&Arc<[f32]>> {
        self.pcm.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.pcm.is_some()
    }

    /// Decodes this sample's slice of a 16-bit blob. Compressed samples are left pending.
    pub fn decode_from(&mut self, blob: &[i16]) -> bool {
        if self.compressed || self.pcm.is_some() {
            return self.pcm.is_some();
        }
        let (start, end) = (self.start as usize, self.end as usize);
        let Some(frames) = blob.get(start..end) else {
            return false;
        };
        self.pcm = Some(frames.iter().map(|&s| s as f32 / 32768.0).collect());
        true
    }

    /// Installs PCM decoded out of band.
    pub fn set_pcm(&mut self, pcm: Arc<[f32]>) {
        self.pcm = Some(pcm);
    }
}
