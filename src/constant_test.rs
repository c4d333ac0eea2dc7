use crate::constant::{
    CAPABILITIES_ALWAYS_DISABLED, CAPABILITIES_ALWAYS_ENABLED, CAPABILITIES_CONFIGURABLE,
    CapabilityFlags, ColumnType,
};

#[test]
fn capability_flags_classification() {
    // All 32 bits set (complete set of possible flags)
    const ALL_FLAGS: u32 = 0xFFFF_FFFF;

    let always_enabled = CAPABILITIES_ALWAYS_ENABLED;
    let configurable = CAPABILITIES_CONFIGURABLE;
    let always_disabled = CAPABILITIES_ALWAYS_DISABLED;

    assert!(
        always_enabled.intersection(configurable).is_empty(),
        "ALWAYS_ENABLED and CONFIGURABLE must not overlap"
    );
    assert!(
        always_enabled.intersection(always_disabled).is_empty(),
        "ALWAYS_ENABLED and ALWAYS_DISABLED must not overlap"
    );
    assert!(
        configurable.intersection(always_disabled).is_empty(),
        "CONFIGURABLE and ALWAYS_DISABLED must not overlap"
    );

    let union = always_enabled | configurable | always_disabled;
    assert_eq!(
        union.bits(),
        ALL_FLAGS,
        "Missing flags: 0x{:08X}",
        ALL_FLAGS & !union.bits()
    );

    assert!(always_enabled.contains(CapabilityFlags::CLIENT_PROTOCOL_41));
    assert!(always_enabled.contains(CapabilityFlags::CLIENT_PLUGIN_AUTH));
    assert!(always_enabled.contains(CapabilityFlags::CLIENT_SECURE_CONNECTION));
    assert!(configurable.contains(CapabilityFlags::CLIENT_DEPRECATE_EOF));
    assert!(always_disabled.contains(CapabilityFlags::CLIENT_INTERACTIVE));
    assert!(always_disabled.contains(CapabilityFlags::CLIENT_SSL));
    assert!(always_disabled.contains(CapabilityFlags::CLIENT_CONNECT_WITH_DB));
}

#[test]
fn column_type_from_u8_round_trips_known_codes() {
    for code in 0..=u8::MAX {
        if let Some(ty) = ColumnType::from_u8(code) {
            assert_eq!(ty as u8, code);
        }
    }
    assert_eq!(ColumnType::from_u8(0x15), None);
    assert_eq!(ColumnType::from_u8(0xfd), Some(ColumnType::MYSQL_TYPE_VAR_STRING));
}
