//! Server NIC settings and the comparable NIC snapshot

use super::client::ServerClient;
use crate::error::{Result, ServiceError};
use sacloud_iaas::{ConnectedSwitch, Id, InterfaceView, Scope, UpstreamNetworkType};

/// Setting of the first NIC
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NicSetting {
    /// Shared segment
    Shared { packet_filter_id: Id },
    Connected {
        switch_id: Id,
        display_ip_address: String,
        packet_filter_id: Id,
    },
    Disconnected,
}

/// Setting of the second and later NICs. These cannot use the shared segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdditionalNicSetting {
    Connected {
        switch_id: Id,
        display_ip_address: String,
        packet_filter_id: Id,
    },
    Disconnected,
}

impl NicSetting {
    pub async fn validate(&self, client: &ServerClient, zone: &str) -> Result<()> {
        match self {
            NicSetting::Shared { packet_filter_id } => {
                validate_packet_filter(client, zone, *packet_filter_id).await
            }
            NicSetting::Connected {
                switch_id,
                packet_filter_id,
                ..
            } => {
                validate_switch(client, zone, *switch_id).await?;
                validate_packet_filter(client, zone, *packet_filter_id).await
            }
            NicSetting::Disconnected => Ok(()),
        }
    }

    pub fn connected_switch(&self) -> Option<ConnectedSwitch> {
        match self {
            NicSetting::Shared { .. } => Some(ConnectedSwitch::shared()),
            NicSetting::Connected { switch_id, .. } => Some(ConnectedSwitch::switch(*switch_id)),
            NicSetting::Disconnected => None,
        }
    }

    pub fn packet_filter_id(&self) -> Id {
        match self {
            NicSetting::Shared { packet_filter_id }
            | NicSetting::Connected {
                packet_filter_id, ..
            } => *packet_filter_id,
            NicSetting::Disconnected => Id::default(),
        }
    }

    pub fn display_ip_address(&self) -> &str {
        match self {
            NicSetting::Connected {
                display_ip_address, ..
            } => display_ip_address,
            _ => "",
        }
    }

    pub(crate) fn state(&self) -> NicState {
        match self {
            NicSetting::Shared { packet_filter_id } => NicState {
                upstream: UpstreamNetworkType::Shared,
                switch_id: Id::default(),
                packet_filter_id: *packet_filter_id,
                display_ip: String::new(),
            },
            NicSetting::Connected {
                switch_id,
                display_ip_address,
                packet_filter_id,
            } => NicState {
                upstream: UpstreamNetworkType::Switch,
                switch_id: *switch_id,
                packet_filter_id: *packet_filter_id,
                display_ip: display_ip_address.clone(),
            },
            NicSetting::Disconnected => NicState::default(),
        }
    }

    /// Setting that reproduces an existing NIC
    pub fn from_interface(iface: &InterfaceView) -> Self {
        if iface.switch_id.is_empty() {
            NicSetting::Disconnected
        } else if iface.switch_scope == Scope::Shared {
            NicSetting::Shared {
                packet_filter_id: iface.packet_filter_id,
            }
        } else {
            NicSetting::Connected {
                switch_id: iface.switch_id,
                display_ip_address: iface.user_ip_address.clone(),
                packet_filter_id: iface.packet_filter_id,
            }
        }
    }
}

impl AdditionalNicSetting {
    pub async fn validate(&self, client: &ServerClient, zone: &str) -> Result<()> {
        match self {
            AdditionalNicSetting::Connected {
                switch_id,
                packet_filter_id,
                ..
            } => {
                validate_switch(client, zone, *switch_id).await?;
                validate_packet_filter(client, zone, *packet_filter_id).await
            }
            AdditionalNicSetting::Disconnected => Ok(()),
        }
    }

    pub fn switch_id(&self) -> Id {
        match self {
            AdditionalNicSetting::Connected { switch_id, .. } => *switch_id,
            AdditionalNicSetting::Disconnected => Id::default(),
        }
    }

    pub fn packet_filter_id(&self) -> Id {
        match self {
            AdditionalNicSetting::Connected {
                packet_filter_id, ..
            } => *packet_filter_id,
            AdditionalNicSetting::Disconnected => Id::default(),
        }
    }

    pub fn display_ip_address(&self) -> &str {
        match self {
            AdditionalNicSetting::Connected {
                display_ip_address, ..
            } => display_ip_address,
            AdditionalNicSetting::Disconnected => "",
        }
    }

    pub(crate) fn state(&self) -> NicState {
        match self {
            AdditionalNicSetting::Connected {
                switch_id,
                display_ip_address,
                packet_filter_id,
            } => NicState {
                upstream: UpstreamNetworkType::Switch,
                switch_id: *switch_id,
                packet_filter_id: *packet_filter_id,
                display_ip: display_ip_address.clone(),
            },
            AdditionalNicSetting::Disconnected => NicState::default(),
        }
    }

    pub fn from_interface(iface: &InterfaceView) -> Self {
        if iface.switch_id.is_empty() {
            AdditionalNicSetting::Disconnected
        } else {
            AdditionalNicSetting::Connected {
                switch_id: iface.switch_id,
                display_ip_address: iface.user_ip_address.clone(),
                packet_filter_id: iface.packet_filter_id,
            }
        }
    }
}

async fn validate_switch(client: &ServerClient, zone: &str, switch_id: Id) -> Result<()> {
    if switch_id.is_empty() {
        return Err(ServiceError::validation("switch id is required"));
    }
    client.switch.read(zone, switch_id).await?;
    Ok(())
}

async fn validate_packet_filter(
    client: &ServerClient,
    zone: &str,
    packet_filter_id: Id,
) -> Result<()> {
    if !packet_filter_id.is_empty() {
        client.packet_filter.read(zone, packet_filter_id).await?;
    }
    Ok(())
}

/// Comparable snapshot of a NIC's upstream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct NicState {
    pub upstream: UpstreamNetworkType,
    pub switch_id: Id,
    pub packet_filter_id: Id,
    pub display_ip: String,
}

impl NicState {
    pub fn from_interface(iface: &InterfaceView) -> Self {
        if iface.switch_scope == Scope::Shared {
            NicState {
                upstream: UpstreamNetworkType::Shared,
                switch_id: Id::default(),
                packet_filter_id: iface.packet_filter_id,
                display_ip: String::new(),
            }
        } else if iface.switch_id.is_empty() {
            NicState::default()
        } else {
            NicState {
                upstream: UpstreamNetworkType::Switch,
                switch_id: iface.switch_id,
                packet_filter_id: iface.packet_filter_id,
                display_ip: iface.user_ip_address.clone(),
            }
        }
    }

    /// Clear the fields that can change while the server runs
    pub fn topology(mut self) -> Self {
        self.packet_filter_id = Id::default();
        self.display_ip = String::new();
        self
    }
}
