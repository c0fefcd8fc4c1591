//! Properties: named owners of primitive lists and the per-property priority rule.

use std::fmt;
use std::ops::BitOr;

use crate::geom::CoordSystem;
use crate::primitives::{PrimitiveArena, PrimitiveId, PropertyId};

/// Bit set of property roles, also used as a query filter.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PropertyType(u32);

impl PropertyType {
    pub const ANY: Self = Self(0xffff);
    pub const UNKNOWN: Self = Self(0x1);
    pub const MATERIAL: Self = Self(0x2);
    pub const METAL: Self = Self(0x4);
    pub const EXCITATION: Self = Self(0x8);
    pub const PROBEBOX: Self = Self(0x10);
    pub const RESBOX: Self = Self(0x20);
    pub const DUMPBOX: Self = Self(0x40);
    pub const DISPERSIVE: Self = Self(0x100);
    pub const LORENTZ: Self = Self(0x200);
    pub const DEBYE: Self = Self(0x400);
    pub const DISCRETE: Self = Self(0x1000);
    pub const LUMPED: Self = Self(0x2000);
    pub const CONDUCTING_SHEET: Self = Self(0x4000);
    pub const ABSORBING_BC: Self = Self(0x8000);

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// True when `self` passes `filter`; [`PropertyType::ANY`] passes everything.
    #[must_use]
    pub const fn matches(self, filter: Self) -> bool {
        filter.0 == Self::ANY.0 || self.0 & filter.0 != 0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for PropertyType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Concrete property kinds with their persistence element names.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PropertyKind {
    Unknown,
    Material,
    DiscMaterial,
    LorentzMaterial,
    DebyeMaterial,
    LumpedElement,
    Metal,
    ConductingSheet,
    Excitation,
    ProbeBox,
    ResBox,
    DumpBox,
    AbsorbingBc,
}

impl PropertyKind {
    pub const ALL: [Self; 13] = [
        Self::Unknown,
        Self::Material,
        Self::DiscMaterial,
        Self::LorentzMaterial,
        Self::DebyeMaterial,
        Self::LumpedElement,
        Self::Metal,
        Self::ConductingSheet,
        Self::Excitation,
        Self::ProbeBox,
        Self::ResBox,
        Self::DumpBox,
        Self::AbsorbingBc,
    ];

    #[must_use]
    pub const fn element(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Material => "Material",
            Self::DiscMaterial => "DiscMaterial",
            Self::LorentzMaterial => "LorentzMaterial",
            Self::DebyeMaterial => "DebyeMaterial",
            Self::LumpedElement => "LumpedElement",
            Self::Metal => "Metal",
            Self::ConductingSheet => "ConductingSheet",
            Self::Excitation => "Excitation",
            Self::ProbeBox => "ProbeBox",
            Self::ResBox => "ResBox",
            Self::DumpBox => "DumpBox",
            Self::AbsorbingBc => "AbsorbingBC",
        }
    }

    /// Accepts every element name, including the legacy `ChargeBox`.
    #[must_use]
    pub fn from_element(element: &str) -> Option<Self> {
        if element == "ChargeBox" {
            return Some(Self::ProbeBox);
        }
        Self::ALL.into_iter().find(|kind| kind.element() == element)
    }

    #[must_use]
    pub fn type_flags(self) -> PropertyType {
        use PropertyType as T;
        match self {
            Self::Unknown => T::UNKNOWN,
            Self::Material => T::MATERIAL,
            Self::DiscMaterial => T::DISCRETE | T::MATERIAL,
            Self::LorentzMaterial => T::LORENTZ | T::DISPERSIVE | T::MATERIAL,
            Self::DebyeMaterial => T::DEBYE | T::DISPERSIVE | T::MATERIAL,
            Self::LumpedElement => T::LUMPED,
            Self::Metal => T::METAL,
            Self::ConductingSheet => T::CONDUCTING_SHEET | T::METAL,
            Self::Excitation => T::EXCITATION,
            Self::ProbeBox => T::PROBEBOX,
            Self::ResBox => T::RESBOX,
            Self::DumpBox => T::DUMPBOX,
            Self::AbsorbingBc => T::ABSORBING_BC,
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element())
    }
}

/// Named owner of an ordered primitive list.
///
/// The list order is the tie-break order of [`Property::check_coord_in_primitive`].
/// Membership changes go through the scene so that every primitive's back
/// reference stays in sync with exactly one list.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    name: String,
    kind: PropertyKind,
    index: usize,
    unique_id: PropertyId,
    primitives: Vec<PrimitiveId>,
    coord_system: CoordSystem,
    attributes: Vec<(String, String)>,
}

impl Property {
    #[must_use]
    pub fn new(kind: PropertyKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            index: 0,
            unique_id: PropertyId::default(),
            primitives: Vec::new(),
            coord_system: CoordSystem::Cartesian,
            attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[must_use]
    pub const fn kind(&self) -> PropertyKind {
        self.kind
    }

    #[must_use]
    pub fn type_flags(&self) -> PropertyType {
        self.kind.type_flags()
    }

    /// Position of the property in its scene.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    #[must_use]
    pub const fn unique_id(&self) -> PropertyId {
        self.unique_id
    }

    pub(crate) fn set_unique_id(&mut self, id: PropertyId) {
        self.unique_id = id;
    }

    #[must_use]
    pub const fn coord_system(&self) -> CoordSystem {
        self.coord_system
    }

    pub(crate) fn set_coord_system(&mut self, system: CoordSystem) {
        self.coord_system = system;
    }

    #[must_use]
    pub fn primitives(&self) -> &[PrimitiveId] {
        &self.primitives
    }

    #[must_use]
    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    #[must_use]
    pub fn has_primitive(&self, id: PrimitiveId) -> bool {
        self.primitives.contains(&id)
    }

    /// Appends `id`; false if it is already listed.
    pub(crate) fn push_primitive(&mut self, id: PrimitiveId) -> bool {
        if self.has_primitive(id) {
            return false;
        }
        self.primitives.push(id);
        true
    }

    pub(crate) fn remove_primitive(&mut self, id: PrimitiveId) -> bool {
        match self.primitives.iter().position(|&p| p == id) {
            Some(pos) => {
                self.primitives.remove(pos);
                true
            }
            None => false,
        }
    }

    pub(crate) fn take_primitive(&mut self, index: usize) -> Option<PrimitiveId> {
        (index < self.primitives.len()).then(|| self.primitives.remove(index))
    }

    pub(crate) fn take_all_primitives(&mut self) -> Vec<PrimitiveId> {
        std::mem::take(&mut self.primitives)
    }

    #[must_use]
    pub fn exists_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|(n, _)| n == name)
    }

    /// Value of attribute `name`, or `None` if it is not set.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets or overwrites an attribute. Empty names are ignored.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if name.is_empty() {
            return;
        }
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> bool {
        match self.attributes.iter().position(|(n, _)| n == name) {
            Some(pos) => {
                self.attributes.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Attributes in insertion order.
    #[must_use]
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Highest-priority listed primitive containing `coord`.
    ///
    /// A later primitive replaces the current winner only with a strictly greater
    /// priority, so the earliest one wins ties.
    #[must_use]
    pub fn check_coord_in_primitive(
        &self,
        arena: &PrimitiveArena,
        coord: [f64; 3],
        tol: f64,
    ) -> Option<(PrimitiveId, i32)> {
        let mut best: Option<(PrimitiveId, i32)> = None;
        for prim in self.primitives.iter().filter_map(|&id| arena.get(id)) {
            if !prim.is_inside(coord, tol) {
                continue;
            }
            if best.is_none_or(|(_, priority)| prim.priority() > priority) {
                best = Some((prim.id(), prim.priority()));
            }
        }
        best
    }

    /// One warning per primitive never marked as used, or one for an empty property.
    #[must_use]
    pub fn unused_primitive_warnings(&self, arena: &PrimitiveArena) -> Vec<String> {
        if self.primitives.is_empty() {
            return vec![format!("Warning: No primitives found in property: {}!", self.name)];
        }
        self.primitives
            .iter()
            .filter_map(|&id| arena.get(id))
            .filter(|prim| !prim.is_used())
            .map(|prim| {
                format!(
                    "Warning: Unused primitive (type: {}) detected in property: {}!",
                    prim.type_name(),
                    self.name
                )
            })
            .collect()
    }

    /// Human-readable dump of the property and its primitives.
    #[must_use]
    pub fn status(&self, arena: &PrimitiveArena) -> String {
        let mut out = format!(
            " Property #{} Type: \"{}\" Name: \"{}\"\n Primitive Count \t: {}\n Coordinate System \t: {}\n  -- Primitives: --\n",
            self.index,
            self.kind,
            self.name,
            self.primitives.len(),
            self.coord_system
        );
        let listed: Vec<String> = self
            .primitives
            .iter()
            .filter_map(|&id| arena.get(id))
            .map(crate::primitives::Primitive::status)
            .collect();
        out.push_str(&listed.join(" ---- \n"));
        out
    }
}
