//! Resource kinds managed by the engine.

wire_enum! {
    /// The five kinds of network-security object.
    pub enum ResourceKind {
        FirewallRule => "firewall_rule",
        IpSet => "ip_set",
        SecurityPolicyRule => "security_policy_rule",
        Service => "service",
        EdgeFirewallRule => "edge_firewall_rule",
    }
}

impl ResourceKind {
    /// Human-readable label for messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FirewallRule => "firewall rule",
            Self::IpSet => "IP set",
            Self::SecurityPolicyRule => "security policy rule",
            Self::Service => "service",
            Self::EdgeFirewallRule => "edge firewall rule",
        }
    }

    /// Whether resources of this kind are sub-entries of a shared document.
    #[must_use]
    pub const fn is_shared(self) -> bool {
        matches!(
            self,
            Self::FirewallRule | Self::SecurityPolicyRule | Self::EdgeFirewallRule
        )
    }
}
