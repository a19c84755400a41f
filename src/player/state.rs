//! Player state set
//!
//! Three states are internal to the scrobbler (`Start`, `StorageUnmounted`,
//! `StorageMounted`); the rest mirror the `OMX_State*` names the audio
//! pipeline reports in its state-change lines.

/// Player state as tracked by the inference engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlayerState {
    /// Cold-boot state; the first reported transition is accepted as-is.
    #[default]
    Start,
    /// Internal storage is gone; no transition is accepted except to
    /// `StorageMounted`.
    StorageUnmounted,
    StorageMounted,
    WaitForResources,
    Pause,
    Executing,
    Unknown,
    Invalid,
    Loaded,
    Idle,
}

impl PlayerState {
    /// Map a pipeline-reported state name onto the engine's state set.
    /// Names outside the known set collapse to [`PlayerState::Start`].
    pub fn from_omx(name: &str) -> Self {
        match name {
            "OMX_StateWaitForResources" => Self::WaitForResources,
            "OMX_StatePause" => Self::Pause,
            "OMX_StateExecuting" => Self::Executing,
            "OMX_StateUnknown" => Self::Unknown,
            "OMX_StateInvalid" => Self::Invalid,
            "OMX_StateLoaded" => Self::Loaded,
            "OMX_StateIdle" => Self::Idle,
            _ => Self::Start,
        }
    }

    /// True for the two mount states, which cut through any player state.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::StorageUnmounted | Self::StorageMounted)
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Start => "ScrobblerStart",
            Self::StorageUnmounted => "ScrobblerStorageUnmounted",
            Self::StorageMounted => "ScrobblerStorageMounted",
            Self::WaitForResources => "OMX_StateWaitForResources",
            Self::Pause => "OMX_StatePause",
            Self::Executing => "OMX_StateExecuting",
            Self::Unknown => "OMX_StateUnknown",
            Self::Invalid => "OMX_StateInvalid",
            Self::Loaded => "OMX_StateLoaded",
            Self::Idle => "OMX_StateIdle",
        };
        write!(f, "{name}")
    }
}
