//! eDavki schema descriptors
//!
//! Element and attribute names here are mandated by FURS and must be
//! reproduced exactly.

use clap::ValueEnum;
use serde::Deserialize;
use std::fmt;

const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const EDP_NS: &str = "http://edavki.durs.si/Documents/Schemas/EDP-Common-1.xsd";

/// Target schema version, chosen at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaVersion {
    /// Doh_KDVP_9 with numbered field codes
    #[default]
    Kdvp9,
    /// Doh_KDVP_9 with the ISIN of every security
    Kdvp9Isin,
    /// Doh_KDVP_8 with rows as named attributes
    Kdvp8Attributes,
}

impl SchemaVersion {
    pub fn descriptor(&self) -> &'static SchemaDescriptor {
        match self {
            SchemaVersion::Kdvp9 => &KDVP_9,
            SchemaVersion::Kdvp9Isin => &KDVP_9_ISIN,
            SchemaVersion::Kdvp8Attributes => &KDVP_8_ATTRIBUTES,
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor().name)
    }
}

/// Whether row fields are child elements or attributes of the row entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStyle {
    Elements,
    Attributes,
}

#[derive(Debug, Clone, Copy)]
pub struct PurchaseFields {
    pub date: &'static str,
    pub method: &'static str,
    pub quantity: &'static str,
    pub price: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct SaleFields {
    pub date: &'static str,
    pub quantity: &'static str,
    pub price: &'static str,
    pub loss_rule: &'static str,
}

/// Everything the emitter needs to know about one schema version
#[derive(Debug, Clone, Copy)]
pub struct SchemaDescriptor {
    pub name: &'static str,
    pub root: &'static str,
    /// Attributes of the root element, in output order
    pub namespaces: &'static [(&'static str, &'static str)],
    pub requires_isin: bool,
    pub row_style: RowStyle,
    pub purchase: PurchaseFields,
    pub sale: SaleFields,
}

const FIELD_CODES_PURCHASE: PurchaseFields = PurchaseFields {
    date: "F1",
    method: "F2",
    quantity: "F3",
    price: "F4",
};

const FIELD_CODES_SALE: SaleFields = SaleFields {
    date: "F6",
    quantity: "F7",
    price: "F9",
    loss_rule: "F10",
};

const KDVP_9_NAMESPACES: &[(&str, &str)] = &[
    ("xmlns", "http://edavki.durs.si/Documents/Schemas/Doh_KDVP_9.xsd"),
    ("xmlns:edp", EDP_NS),
    ("xmlns:xsi", XSI_NS),
    (
        "xsi:schemaLocation",
        "http://www.w3.org/2001/XMLSchema-instance http://www.w3.org/2001/XMLSchema-instance \
         http://edavki.durs.si/Documents/Schemas/Doh_KDVP_9.xsd https://edavki.durs.si/Documents/Schemas/Doh_KDVP_9.xsd \
         http://edavki.durs.si/Documents/Schemas/EDP-Common-1.xsd http://edavki.durs.si/Documents/Schemas/EDP-Common-1.xsd",
    ),
];

pub const KDVP_9: SchemaDescriptor = SchemaDescriptor {
    name: "kdvp9",
    root: "Envelope",
    namespaces: KDVP_9_NAMESPACES,
    requires_isin: false,
    row_style: RowStyle::Elements,
    purchase: FIELD_CODES_PURCHASE,
    sale: FIELD_CODES_SALE,
};

pub const KDVP_9_ISIN: SchemaDescriptor = SchemaDescriptor {
    name: "kdvp9-isin",
    requires_isin: true,
    ..KDVP_9
};

pub const KDVP_8_ATTRIBUTES: SchemaDescriptor = SchemaDescriptor {
    name: "kdvp8-attributes",
    root: "Envelope",
    namespaces: &[
        ("xmlns", "http://edavki.durs.si/Documents/Schemas/Doh_KDVP_8.xsd"),
        ("xmlns:edp", EDP_NS),
        ("xmlns:xsi", XSI_NS),
        (
            "xsi:schemaLocation",
            "http://edavki.durs.si/Documents/Schemas/Doh_KDVP_8.xsd https://edavki.durs.si/Documents/Schemas/Doh_KDVP_8.xsd \
             http://edavki.durs.si/Documents/Schemas/EDP-Common-1.xsd http://edavki.durs.si/Documents/Schemas/EDP-Common-1.xsd",
        ),
    ],
    requires_isin: true,
    row_style: RowStyle::Attributes,
    purchase: PurchaseFields {
        date: "Date",
        method: "Type",
        quantity: "Amount",
        price: "Value",
    },
    sale: SaleFields {
        date: "Date",
        quantity: "Amount",
        price: "Value",
        loss_rule: "LossTransfer",
    },
};
