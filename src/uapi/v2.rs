// Copyright (c) 2018 The rust-gpio-cdev Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Mirrors of the kernel GPIO uAPI v2 structures.
//!
//! Every structure here is laid out exactly as in
//! [`include/uapi/linux/gpio.h`](https://github.com/torvalds/linux/blob/v6.6/include/uapi/linux/gpio.h).
//! Bitfields are carried as raw integers and converted through the
//! [`LineFlags`] and id types at the edges.

use core::mem::size_of;

use bitflags::bitflags;
use nix::ioctl_readwrite;

pub const GPIO_LINES_MAX: usize = 64;
pub const GPIO_MAX_NAME_SIZE: usize = 32;
pub const GPIO_LINE_NUM_ATTRS_MAX: usize = 10;

bitflags! {
    /// Informational and configuration flags
    ///
    /// Maps to kernel [`GPIO_V2_LINE_FLAG_*`] flags.
    ///
    /// [`GPIO_V2_LINE_FLAG_*`]: https://github.com/torvalds/linux/blob/v5.19/include/uapi/linux/gpio.h
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LineFlags: u64 {
        const USED = (1 << 0);
        const ACTIVE_LOW = (1 << 1);
        const INPUT = (1 << 2);
        const OUTPUT = (1 << 3);
        const EDGE_RISING = (1 << 4);
        const EDGE_FALLING = (1 << 5);
        const OPEN_DRAIN = (1 << 6);
        const OPEN_SOURCE = (1 << 7);
        const BIAS_PULL_UP = (1 << 8);
        const BIAS_PULL_DOWN = (1 << 9);
        const BIAS_DISABLED = (1 << 10);
        const EVENT_CLOCK_REALTIME = (1 << 11);
        const EVENT_CLOCK_HTE = (1 << 12);
    }
}

impl LineFlags {
    /// Pack into the wire representation.
    #[inline(always)]
    pub const fn pack(self) -> u64 {
        self.bits()
    }

    /// Unpack from the wire representation, keeping unknown bits.
    #[inline(always)]
    pub const fn unpack(raw: u64) -> Self {
        Self::from_bits_retain(raw)
    }
}

bitflags! {
    /// Attribute IDs
    ///
    /// Maps to kernel [`GPIO_V2_LINE_ATTR_ID_*`] flags.
    ///
    /// [`GPIO_V2_LINE_ATTR_ID_*`]: https://github.com/torvalds/linux/blob/v5.19/include/uapi/linux/gpio.h
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineAttrId: u32 {
        const FLAGS = 1;
        const OUTPUT_VALUES = 2;
        const DEBOUNCE = 3;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct gpio_line_values {
    pub bits: u64,
    pub mask: u64,
}

/// a configurable attribute of a line
#[derive(Clone, Copy)]
#[repr(C)]
pub struct gpio_line_attribute {
    /// attribute identifier, one of [`LineAttrId`]
    pub id: u32,
    /// reserved for future use and must be zero filled
    pub _padding: u32,
    /// A tagged union when combined with `id`
    pub attribute: gpio_line_attribute_union,
}

impl gpio_line_attribute {
    pub const fn zeroed() -> Self {
        Self {
            id: 0,
            _padding: 0,
            attribute: gpio_line_attribute_union { values: 0 },
        }
    }
}

impl core::fmt::Debug for gpio_line_attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // SAFETY: every variant is plain old data and the union is always
        // fully initialised through `zeroed` before being written.
        let value = unsafe {
            match LineAttrId::from_bits_retain(self.id) {
                LineAttrId::FLAGS => &self.attribute.flags as &dyn core::fmt::Debug,
                LineAttrId::OUTPUT_VALUES => &self.attribute.values as &dyn core::fmt::Debug,
                LineAttrId::DEBOUNCE => &self.attribute.debounce_period as &dyn core::fmt::Debug,
                _ => &"unknown line attribute" as &dyn core::fmt::Debug,
            }
        };
        f.debug_struct("gpio_line_attribute")
            .field("id", &self.id)
            .field("attribute", value)
            .finish()
    }
}

#[derive(Clone, Copy)]
#[repr(C)]
pub union gpio_line_attribute_union {
    /// if `id` is [`LineAttrId::FLAGS`], the packed [`LineFlags`] for the
    /// line.  This overrides the default flags contained in the
    /// [`gpio_line_config`] for the associated lines.
    pub flags: u64,
    /// if `id` is [`LineAttrId::OUTPUT_VALUES`], a bitmap containing the
    /// values to which the lines will be set, with each bit number
    /// corresponding to the index into `gpio_line_request.offsets`
    pub values: u64,
    /// if `id` is [`LineAttrId::DEBOUNCE`], the desired debounce period, in
    /// microseconds
    pub debounce_period: u32,
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct gpio_line_config_attribute {
    pub attr: gpio_line_attribute,
    /// request-relative bitmap of the lines the attribute applies to
    pub mask: u64,
}

impl gpio_line_config_attribute {
    pub const fn zeroed() -> Self {
        Self {
            attr: gpio_line_attribute::zeroed(),
            mask: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct gpio_line_config {
    pub flags: u64,
    pub num_attrs: u32,
    pub _padding: [u32; 5],
    pub attrs: [gpio_line_config_attribute; GPIO_LINE_NUM_ATTRS_MAX],
}

impl gpio_line_config {
    pub const fn zeroed() -> Self {
        Self {
            flags: 0,
            num_attrs: 0,
            _padding: [0; 5],
            attrs: [gpio_line_config_attribute::zeroed(); GPIO_LINE_NUM_ATTRS_MAX],
        }
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct gpio_line_request {
    pub offsets: [u32; GPIO_LINES_MAX],
    pub consumer: [u8; GPIO_MAX_NAME_SIZE],
    pub config: gpio_line_config,
    pub num_lines: u32,
    pub event_buffer_size: u32,
    pub _padding: [u32; 5],
    /// filled in by the kernel on success
    pub fd: std::os::fd::RawFd,
}

impl gpio_line_request {
    pub const fn zeroed() -> Self {
        Self {
            offsets: [0; GPIO_LINES_MAX],
            consumer: [0; GPIO_MAX_NAME_SIZE],
            config: gpio_line_config::zeroed(),
            num_lines: 0,
            event_buffer_size: 0,
            _padding: [0; 5],
            fd: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct gpio_line_info {
    pub name: [u8; GPIO_MAX_NAME_SIZE],
    pub consumer: [u8; GPIO_MAX_NAME_SIZE],
    pub offset: u32,
    pub num_attrs: u32,
    pub flags: u64,
    pub attrs: [gpio_line_attribute; GPIO_LINE_NUM_ATTRS_MAX],
    pub _padding: [u32; 4],
}

impl gpio_line_info {
    pub const fn zeroed() -> Self {
        Self {
            name: [0; GPIO_MAX_NAME_SIZE],
            consumer: [0; GPIO_MAX_NAME_SIZE],
            offset: 0,
            num_attrs: 0,
            flags: 0,
            attrs: [gpio_line_attribute::zeroed(); GPIO_LINE_NUM_ATTRS_MAX],
            _padding: [0; 4],
        }
    }
}

impl Default for gpio_line_info {
    #[inline(always)]
    fn default() -> Self {
        Self::zeroed()
    }
}

bitflags! {
    /// Changed Type
    ///
    /// Maps to kernel [`GPIO_V2_LINE_CHANGED_*`] flags.
    ///
    /// [`GPIO_V2_LINE_CHANGED_*`]: https://github.com/torvalds/linux/blob/v5.19/include/uapi/linux/gpio.h
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineChangedType: u32 {
        const REQUESTED = 1;
        const RELEASED = 2;
        const CONFIG = 3;
    }
}

/// Information about a change in status of a GPIO line
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct gpio_line_info_changed {
    pub info: gpio_line_info,
    pub timestamp_ns: u64,
    pub event_type: u32,
    /* Pad struct to 64-bit boundary and reserve space for future use. */
    pub _padding: [u32; 5],
}

impl gpio_line_info_changed {
    pub const fn zeroed() -> Self {
        Self {
            info: gpio_line_info::zeroed(),
            timestamp_ns: 0,
            event_type: 0,
            _padding: [0; 5],
        }
    }
}

bitflags! {
    /// Line Event ID
    ///
    /// Maps to kernel [`GPIO_V2_LINE_EVENT_*`] flags.
    ///
    /// [`GPIO_V2_LINE_EVENT_*`]: https://github.com/torvalds/linux/blob/v5.19/include/uapi/linux/gpio.h
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineEventId: u32 {
        const RISING_EDGE = 1;
        const FALLING_EDGE = 2;
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct gpio_line_event {
    pub timestamp_ns: u64,
    pub id: u32,
    pub offset: u32,
    pub seqno: u32,
    pub line_seqno: u32,
    /* Space reserved for future use. */
    pub _padding: [u32; 6],
}

impl gpio_line_event {
    #[inline(always)]
    pub const fn zeroed() -> Self {
        Self {
            timestamp_ns: 0,
            id: 0,
            offset: 0,
            seqno: 0,
            line_seqno: 0,
            _padding: [0; 6],
        }
    }
}

impl Default for gpio_line_event {
    #[inline(always)]
    fn default() -> Self {
        Self::zeroed()
    }
}

const _: () = assert!(size_of::<gpio_line_attribute>() == 16);
const _: () = assert!(size_of::<gpio_line_config_attribute>() == 24);
const _: () = assert!(size_of::<gpio_line_config>() == 272);
const _: () = assert!(size_of::<gpio_line_request>() == 592);
const _: () = assert!(size_of::<gpio_line_info>() == 256);
const _: () = assert!(size_of::<gpio_line_values>() == 16);
const _: () = assert!(size_of::<gpio_line_info_changed>() == 288);
const _: () = assert!(size_of::<gpio_line_event>() == 48);

ioctl_readwrite!(gpio_get_line, 0xB4, 0x07, gpio_line_request);

ioctl_readwrite!(gpio_get_line_info, 0xB4, 0x05, gpio_line_info);
ioctl_readwrite!(gpio_get_line_info_watch, 0xB4, 0x06, gpio_line_info);

ioctl_readwrite!(gpio_line_set_config, 0xB4, 0x0D, gpio_line_config);

ioctl_readwrite!(gpio_line_get_values, 0xB4, 0x0E, gpio_line_values);
ioctl_readwrite!(gpio_line_set_values, 0xB4, 0x0F, gpio_line_values);
