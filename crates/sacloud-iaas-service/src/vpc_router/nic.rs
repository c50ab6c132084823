//! NIC settings of VPC routers
//!
//! eth0 is either on the shared segment (standard plan) or on a switch with
//! its own addresses (premium and higher). eth1 to eth7 are always on a
//! switch.

use crate::error::{Result, ServiceError};
use sacloud_iaas::{ConnectedSwitch, Id, VpcRouter, VpcRouterInterfaceSetting, VpcRouterPlan};
use serde::Deserialize;

/// Highest NIC index of a VPC router
pub const MAX_NIC_INDEX: usize = 7;

/// Settings of eth0
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NicSetting {
    /// Shared segment
    #[default]
    Standard,
    Premium {
        switch_id: Id,
        ip_addresses: Vec<String>,
        #[serde(default)]
        virtual_ip_address: String,
        #[serde(default)]
        ip_aliases: Vec<String>,
    },
}

impl NicSetting {
    pub fn validate(&self, plan: VpcRouterPlan) -> Result<()> {
        match self {
            NicSetting::Standard if !plan.is_standard() => Err(ServiceError::validation(
                "a premium NIC setting is required for non-standard plans",
            )),
            NicSetting::Premium { .. } if plan.is_standard() => Err(ServiceError::validation(
                "the standard plan only supports the standard NIC setting",
            )),
            NicSetting::Premium {
                switch_id,
                ip_addresses,
                ..
            } => {
                if switch_id.is_empty() {
                    return Err(ServiceError::validation("eth0 switch id is required"));
                }
                if ip_addresses.len() != 2 {
                    return Err(ServiceError::validation(
                        "eth0 needs exactly two real IP addresses",
                    ));
                }
                Ok(())
            }
            NicSetting::Standard => Ok(()),
        }
    }

    pub fn connected_switch(&self) -> ConnectedSwitch {
        match self {
            NicSetting::Standard => ConnectedSwitch::shared(),
            NicSetting::Premium { switch_id, .. } => ConnectedSwitch::switch(*switch_id),
        }
    }

    pub fn ip_addresses(&self) -> Vec<String> {
        match self {
            NicSetting::Standard => vec![],
            NicSetting::Premium { ip_addresses, .. } => ip_addresses.clone(),
        }
    }

    pub fn interface_setting(&self) -> Option<VpcRouterInterfaceSetting> {
        match self {
            NicSetting::Standard => None,
            NicSetting::Premium {
                ip_addresses,
                virtual_ip_address,
                ip_aliases,
                ..
            } => Some(VpcRouterInterfaceSetting {
                index: 0,
                ip_address: ip_addresses.clone(),
                virtual_ip_address: virtual_ip_address.clone(),
                ip_aliases: ip_aliases.clone(),
                network_mask_len: 0,
            }),
        }
    }

    pub fn from_router(router: &VpcRouter) -> Self {
        if router.plan.is_standard() {
            return NicSetting::Standard;
        }
        let setting = router.settings.interface(0).cloned().unwrap_or_default();
        NicSetting::Premium {
            switch_id: router.interface(0).map(|nic| nic.switch_id).unwrap_or_default(),
            ip_addresses: setting.ip_address,
            virtual_ip_address: setting.virtual_ip_address,
            ip_aliases: setting.ip_aliases,
        }
    }
}

/// Settings of eth1 to eth7
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AdditionalNicSetting {
    Standard {
        index: usize,
        switch_id: Id,
        ip_address: String,
        network_mask_len: u8,
    },
    Premium {
        index: usize,
        switch_id: Id,
        /// Real addresses of the two router instances
        ip_addresses: Vec<String>,
        virtual_ip_address: String,
        network_mask_len: u8,
    },
}

impl AdditionalNicSetting {
    pub fn index(&self) -> usize {
        match self {
            AdditionalNicSetting::Standard { index, .. }
            | AdditionalNicSetting::Premium { index, .. } => *index,
        }
    }

    pub fn switch_id(&self) -> Id {
        match self {
            AdditionalNicSetting::Standard { switch_id, .. }
            | AdditionalNicSetting::Premium { switch_id, .. } => *switch_id,
        }
    }

    pub fn validate(&self, plan: VpcRouterPlan) -> Result<()> {
        let index = self.index();
        if !(1..=MAX_NIC_INDEX).contains(&index) {
            return Err(ServiceError::validation(format!(
                "NIC index must be between 1 and {}: {}",
                MAX_NIC_INDEX, index
            )));
        }
        if self.switch_id().is_empty() {
            return Err(ServiceError::validation(format!(
                "switch id of eth{} is required",
                index
            )));
        }
        match self {
            AdditionalNicSetting::Standard { .. } if !plan.is_standard() => {
                Err(ServiceError::validation(format!(
                    "eth{} needs a premium NIC setting for non-standard plans",
                    index
                )))
            }
            AdditionalNicSetting::Premium { .. } if plan.is_standard() => {
                Err(ServiceError::validation(format!(
                    "eth{} needs a standard NIC setting for the standard plan",
                    index
                )))
            }
            AdditionalNicSetting::Standard {
                ip_address,
                network_mask_len,
                ..
            } if ip_address.is_empty() || *network_mask_len == 0 => {
                Err(ServiceError::validation(format!(
                    "IP address and mask of eth{} are required",
                    index
                )))
            }
            AdditionalNicSetting::Premium {
                ip_addresses,
                virtual_ip_address,
                network_mask_len,
                ..
            } if ip_addresses.len() != 2
                || virtual_ip_address.is_empty()
                || *network_mask_len == 0 =>
            {
                Err(ServiceError::validation(format!(
                    "two IP addresses, a virtual IP address and a mask of eth{} are required",
                    index
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn interface_setting(&self) -> VpcRouterInterfaceSetting {
        match self {
            AdditionalNicSetting::Standard {
                index,
                ip_address,
                network_mask_len,
                ..
            } => VpcRouterInterfaceSetting {
                index: *index,
                ip_address: vec![ip_address.clone()],
                network_mask_len: *network_mask_len,
                ..Default::default()
            },
            AdditionalNicSetting::Premium {
                index,
                ip_addresses,
                virtual_ip_address,
                network_mask_len,
                ..
            } => VpcRouterInterfaceSetting {
                index: *index,
                ip_address: ip_addresses.clone(),
                virtual_ip_address: virtual_ip_address.clone(),
                network_mask_len: *network_mask_len,
                ..Default::default()
            },
        }
    }

    /// Connected NICs of eth1 to eth7 that have interface settings
    pub fn from_router(router: &VpcRouter) -> Vec<Self> {
        let mut nics: Vec<Self> = router
            .interfaces
            .iter()
            .filter(|nic| nic.index != 0 && !nic.switch_id.is_empty())
            .filter_map(|nic| {
                let setting = router.settings.interface(nic.index)?;
                Some(if router.plan.is_standard() {
                    AdditionalNicSetting::Standard {
                        index: nic.index,
                        switch_id: nic.switch_id,
                        ip_address: setting.ip_address.first().cloned().unwrap_or_default(),
                        network_mask_len: setting.network_mask_len,
                    }
                } else {
                    AdditionalNicSetting::Premium {
                        index: nic.index,
                        switch_id: nic.switch_id,
                        ip_addresses: setting.ip_address.clone(),
                        virtual_ip_address: setting.virtual_ip_address.clone(),
                        network_mask_len: setting.network_mask_len,
                    }
                })
            })
            .collect();
        nics.sort_by_key(AdditionalNicSetting::index);
        nics
    }
}
