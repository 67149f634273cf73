use serde::{Deserialize, Serialize};

/// Protocol carried by a node port (low six bits of a port-type byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortType {
    Dmx512,
    Midi,
    Avab,
    Colortran,
    Adb625,
    ArtNet,
}

impl PortType {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Dmx512),
            1 => Some(Self::Midi),
            2 => Some(Self::Avab),
            3 => Some(Self::Colortran),
            4 => Some(Self::Adb625),
            5 => Some(Self::ArtNet),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }
}

/// Node style reported in ArtPollReply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStyle {
    #[default]
    Node,
    Controller,
    Media,
    Route,
    Backup,
    Config,
    Visual,
}

impl NodeStyle {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0x00 => Some(Self::Node),
            0x01 => Some(Self::Controller),
            0x02 => Some(Self::Media),
            0x03 => Some(Self::Route),
            0x04 => Some(Self::Backup),
            0x05 => Some(Self::Config),
            0x06 => Some(Self::Visual),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }
}

/// Status code at the start of the ArtPollReply node report (`#xxxx`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportCode {
    Debug,
    PowerOk,
    PowerFail,
    SocketWr1,
    ParseFail,
    UdpFail,
    ShNameOk,
    LoNameOk,
    DmxError,
    DmxUdpFull,
    DmxRxFull,
    SwitchErr,
    ConfigErr,
    DmxShort,
    FirmwareFail,
    UserFail,
}

impl ReportCode {
    const ALL: [ReportCode; 16] = [
        Self::Debug,
        Self::PowerOk,
        Self::PowerFail,
        Self::SocketWr1,
        Self::ParseFail,
        Self::UdpFail,
        Self::ShNameOk,
        Self::LoNameOk,
        Self::DmxError,
        Self::DmxUdpFull,
        Self::DmxRxFull,
        Self::SwitchErr,
        Self::ConfigErr,
        Self::DmxShort,
        Self::FirmwareFail,
        Self::UserFail,
    ];

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Looks up a `#xxxx` id (hex, case-insensitive).
    ///
    /// # Examples
    /// ```
    /// use artnet_core::packets::ReportCode;
    ///
    /// assert_eq!(ReportCode::from_id("#0001"), Some(ReportCode::PowerOk));
    /// assert_eq!(ReportCode::from_id("#000A"), Some(ReportCode::DmxRxFull));
    /// assert_eq!(ReportCode::from_id("0001"), None);
    /// ```
    pub fn from_id(id: &str) -> Option<Self> {
        let hex = id.strip_prefix('#')?;
        if hex.len() != 4 {
            return None;
        }
        u16::from_str_radix(hex, 16).ok().and_then(Self::from_code)
    }

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn id(self) -> String {
        format!("#{:04x}", self.code())
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Debug => "Booted in debug mode",
            Self::PowerOk => "Power On Tests successful",
            Self::PowerFail => "Hardware tests failed at Power On",
            Self::SocketWr1 => {
                "Last UDP from Node failed due to truncated length. Most likely caused by a collision."
            }
            Self::ParseFail => {
                "Unable to identify last UDP transmission. Check OpCode and packet length."
            }
            Self::UdpFail => "Unable to open Udp Socket in last transmission attempt",
            Self::ShNameOk => {
                "Confirms that Short Name programming via ArtAddress, was successful."
            }
            Self::LoNameOk => "Confirms that Long Name programming via ArtAddress, was successful.",
            Self::DmxError => "DMX512 receive errors detected.",
            Self::DmxUdpFull => "Ran out of internal DMX transmit buffers.",
            Self::DmxRxFull => "Ran out of internal DMX Rx buffers.",
            Self::SwitchErr => "Rx Universe switches conflict.",
            Self::ConfigErr => "Product configuration does not match firmware.",
            Self::DmxShort => "DMX output short detected. See GoodOutput field.",
            Self::FirmwareFail => "Last attempt to upload new firmware failed.",
            Self::UserFail => "User changed switch settings when address locked by remote.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NodeStyle, PortType, ReportCode};

    #[test]
    fn report_code_ids_round_trip() {
        for code in 0..16u16 {
            let report = ReportCode::from_code(code).unwrap();
            assert_eq!(report.code(), code);
            assert_eq!(ReportCode::from_id(&report.id()), Some(report));
        }
        assert_eq!(ReportCode::from_code(16), None);
        assert_eq!(ReportCode::from_id("#zzzz"), None);
    }

    #[test]
    fn unknown_ids_map_to_none() {
        assert_eq!(PortType::from_id(5), Some(PortType::ArtNet));
        assert_eq!(PortType::from_id(6), None);
        assert_eq!(NodeStyle::from_id(0x01), Some(NodeStyle::Controller));
        assert_eq!(NodeStyle::from_id(0x07), None);
    }
}
