//! Data call fail causes (3GPP TS 24.008 session management causes plus
//! modem-specific extensions)

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fail cause reported in a data call's `status` field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum FailCause {
    /// No failure
    #[default]
    None,

    // Session management causes
    OperatorBarred,
    NasSignalling,
    InsufficientResources,
    MissingUnknownApn,
    UnknownPdpAddressType,
    UserAuthentication,
    ActivationRejectGgsn,
    ActivationRejectUnspecified,
    ServiceOptionNotSupported,
    ServiceOptionNotSubscribed,
    ServiceOptionOutOfOrder,
    NsapiInUse,
    RegularDeactivation,
    QosNotAccepted,
    NetworkFailure,
    UmtsReactivationRequired,
    FeatureNotSupported,
    OnlyIpv4Allowed,
    OnlyIpv6Allowed,
    OnlySingleBearerAllowed,
    EsmInfoNotReceived,
    PdnConnectionDoesNotExist,
    /// Multiple PDN connections for the same APN not allowed (55)
    MultiConnToSamePdnNotAllowed,
    MaxActivePdpContextReached,
    UnsupportedApnInCurrentPlmn,
    ProtocolErrors,

    // Modem-local causes
    VoiceRegistrationFail,
    DataRegistrationFail,
    SignalLost,
    PreferredRadioTechChanged,
    RadioPowerOff,
    TetheredCallActive,

    /// Unspecified failure (0xFFFF)
    ErrorUnspecified,

    /// Cause not in the table
    Unknown(i32),
}

impl FailCause {
    pub fn is_none(&self) -> bool {
        *self == FailCause::None
    }
}

impl From<i32> for FailCause {
    fn from(value: i32) -> Self {
        match value {
            0x00 => Self::None,
            0x08 => Self::OperatorBarred,
            0x0E => Self::NasSignalling,
            0x1A => Self::InsufficientResources,
            0x1B => Self::MissingUnknownApn,
            0x1C => Self::UnknownPdpAddressType,
            0x1D => Self::UserAuthentication,
            0x1E => Self::ActivationRejectGgsn,
            0x1F => Self::ActivationRejectUnspecified,
            0x20 => Self::ServiceOptionNotSupported,
            0x21 => Self::ServiceOptionNotSubscribed,
            0x22 => Self::ServiceOptionOutOfOrder,
            0x23 => Self::NsapiInUse,
            0x24 => Self::RegularDeactivation,
            0x25 => Self::QosNotAccepted,
            0x26 => Self::NetworkFailure,
            0x27 => Self::UmtsReactivationRequired,
            0x28 => Self::FeatureNotSupported,
            0x32 => Self::OnlyIpv4Allowed,
            0x33 => Self::OnlyIpv6Allowed,
            0x34 => Self::OnlySingleBearerAllowed,
            0x35 => Self::EsmInfoNotReceived,
            0x36 => Self::PdnConnectionDoesNotExist,
            0x37 => Self::MultiConnToSamePdnNotAllowed,
            0x41 => Self::MaxActivePdpContextReached,
            0x42 => Self::UnsupportedApnInCurrentPlmn,
            0x6F => Self::ProtocolErrors,
            -1 => Self::VoiceRegistrationFail,
            -2 => Self::DataRegistrationFail,
            -3 => Self::SignalLost,
            -4 => Self::PreferredRadioTechChanged,
            -5 => Self::RadioPowerOff,
            -6 => Self::TetheredCallActive,
            0xFFFF => Self::ErrorUnspecified,
            other => Self::Unknown(other),
        }
    }
}

impl From<FailCause> for i32 {
    fn from(cause: FailCause) -> Self {
        match cause {
            FailCause::None => 0x00,
            FailCause::OperatorBarred => 0x08,
            FailCause::NasSignalling => 0x0E,
            FailCause::InsufficientResources => 0x1A,
            FailCause::MissingUnknownApn => 0x1B,
            FailCause::UnknownPdpAddressType => 0x1C,
            FailCause::UserAuthentication => 0x1D,
            FailCause::ActivationRejectGgsn => 0x1E,
            FailCause::ActivationRejectUnspecified => 0x1F,
            FailCause::ServiceOptionNotSupported => 0x20,
            FailCause::ServiceOptionNotSubscribed => 0x21,
            FailCause::ServiceOptionOutOfOrder => 0x22,
            FailCause::NsapiInUse => 0x23,
            FailCause::RegularDeactivation => 0x24,
            FailCause::QosNotAccepted => 0x25,
            FailCause::NetworkFailure => 0x26,
            FailCause::UmtsReactivationRequired => 0x27,
            FailCause::FeatureNotSupported => 0x28,
            FailCause::OnlyIpv4Allowed => 0x32,
            FailCause::OnlyIpv6Allowed => 0x33,
            FailCause::OnlySingleBearerAllowed => 0x34,
            FailCause::EsmInfoNotReceived => 0x35,
            FailCause::PdnConnectionDoesNotExist => 0x36,
            FailCause::MultiConnToSamePdnNotAllowed => 0x37,
            FailCause::MaxActivePdpContextReached => 0x41,
            FailCause::UnsupportedApnInCurrentPlmn => 0x42,
            FailCause::ProtocolErrors => 0x6F,
            FailCause::VoiceRegistrationFail => -1,
            FailCause::DataRegistrationFail => -2,
            FailCause::SignalLost => -3,
            FailCause::PreferredRadioTechChanged => -4,
            FailCause::RadioPowerOff => -5,
            FailCause::TetheredCallActive => -6,
            FailCause::ErrorUnspecified => 0xFFFF,
            FailCause::Unknown(v) => v,
        }
    }
}

impl fmt::Display for FailCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(v) => write!(f, "Unknown({})", v),
            other => {
                let code: i32 = (*other).into();
                write!(f, "{:?}({})", other, code)
            }
        }
    }
}
