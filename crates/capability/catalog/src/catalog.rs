use crate::document::{CatalogDocument, RegisterSpec};
use crate::error::CatalogError;
use domain::{
    CrossFieldRule, DataType, Endianness, FunctionCode, RegisterDefinition, SafeRange, WordSwap,
    WriteRules,
};
use invlink_codec::{Conversion, conversion, lookup, validate_scale};
use std::collections::{BTreeSet, HashMap};
use tracing::info;

/// 目录条目：定义 + 加载期解析好的编解码函数对。
#[derive(Debug)]
pub struct CatalogEntry {
    pub definition: RegisterDefinition,
    pub conversion: &'static Conversion,
    pub legacy: bool,
}

/// 不可变寄存器目录，进程启动时构建一次。
#[derive(Debug, Default)]
pub struct Catalog {
    entries: HashMap<String, CatalogEntry>,
}

impl Catalog {
    /// 从文档条目加载，任一条目非法即整体失败。
    pub fn load(specs: Vec<RegisterSpec>) -> Result<Self, CatalogError> {
        let mut entries = HashMap::with_capacity(specs.len());
        for spec in specs {
            let (definition, conversion) = parse_spec(&spec)?;
            insert_entry(&mut entries, definition, conversion, spec.legacy)?;
        }
        let catalog = Self { entries };
        catalog.check_cross_field_partners()?;
        info!(
            target: "invlink.catalog",
            registers = catalog.len(),
            writable = catalog.writable_names().len(),
            "register_catalog_loaded"
        );
        Ok(catalog)
    }

    /// 解析 YAML 文档并加载
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        Self::load(CatalogDocument::from_yaml_str(yaml)?.into_specs())
    }

    /// 直接由已构造的定义加载（同样执行全部校验）
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = RegisterDefinition>,
    ) -> Result<Self, CatalogError> {
        let mut entries = HashMap::new();
        for definition in definitions {
            let conversion = conversion(definition.data_type);
            insert_entry(&mut entries, definition, conversion, false)?;
        }
        let catalog = Self { entries };
        catalog.check_cross_field_partners()?;
        Ok(catalog)
    }

    pub fn lookup(&self, name: &str) -> Result<&RegisterDefinition, CatalogError> {
        self.entry(name).map(|entry| &entry.definition)
    }

    pub fn entry(&self, name: &str) -> Result<&CatalogEntry, CatalogError> {
        self.entries
            .get(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }

    /// 所有可写寄存器名称
    pub fn writable_names(&self) -> BTreeSet<String> {
        self.entries
            .values()
            .filter(|entry| entry.definition.writable)
            .map(|entry| entry.definition.name.clone())
            .collect()
    }

    /// 全部寄存器名称：主表在前、旧版表在后，各自按名称排序
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<(bool, &String)> = self
            .entries
            .values()
            .map(|entry| (entry.legacy, &entry.definition.name))
            .collect();
        names.sort();
        names.into_iter().map(|(_, name)| name.clone()).collect()
    }

    pub fn is_legacy(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|entry| entry.legacy)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_cross_field_partners(&self) -> Result<(), CatalogError> {
        for entry in self.entries.values() {
            let definition = &entry.definition;
            let Some(rule) = &definition.rules.cross_field else {
                continue;
            };
            let partner = rule.partner();
            if partner == definition.name {
                return Err(CatalogError::config(
                    &definition.name,
                    "cross-field partner must be another register",
                ));
            }
            match self.entries.get(partner) {
                Some(other) if other.definition.writable => {}
                Some(_) => {
                    return Err(CatalogError::config(
                        &definition.name,
                        format!("cross-field partner {} is not writable", partner),
                    ));
                }
                None => {
                    return Err(CatalogError::config(
                        &definition.name,
                        format!("cross-field partner {} is not in the catalog", partner),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn insert_entry(
    entries: &mut HashMap<String, CatalogEntry>,
    definition: RegisterDefinition,
    conversion: &'static Conversion,
    legacy: bool,
) -> Result<(), CatalogError> {
    validate_definition(&definition, legacy)?;
    if entries.contains_key(&definition.name) {
        return Err(CatalogError::config(&definition.name, "duplicate register name"));
    }
    entries.insert(
        definition.name.clone(),
        CatalogEntry {
            definition,
            conversion,
            legacy,
        },
    );
    Ok(())
}

/// 文档条目 → 定义（标签解析）
fn parse_spec(spec: &RegisterSpec) -> Result<(RegisterDefinition, &'static Conversion), CatalogError> {
    let name = spec.name.as_str();
    let conversion = lookup(&spec.data_type).ok_or_else(|| {
        CatalogError::config(name, format!("unknown data_type {:?}", spec.data_type))
    })?;
    let data_type = conversion.data_type;

    let function_code = FunctionCode::from_code(spec.function_code).ok_or_else(|| {
        CatalogError::config(name, format!("unknown function_code {}", spec.function_code))
    })?;

    let address = u16::try_from(spec.address).map_err(|_| {
        CatalogError::config(name, format!("address {} outside 0..=65535", spec.address))
    })?;

    let word_count = match (data_type.fixed_word_count(), spec.count) {
        (Some(fixed), None) => fixed,
        (Some(fixed), Some(count)) if count == fixed => fixed,
        (Some(fixed), Some(count)) => {
            return Err(CatalogError::config(
                name,
                format!("count {} does not match {} ({} words)", count, data_type.tag(), fixed),
            ));
        }
        (None, Some(count)) => count,
        (None, None) => {
            return Err(CatalogError::config(name, "string registers require count"));
        }
    };

    let endianness = match spec.endian.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("big") => Endianness::Big,
        Some("little") => Endianness::Little,
        Some(other) => {
            return Err(CatalogError::config(name, format!("unknown endian {:?}", other)));
        }
    };

    let word_swap = match spec.swap.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("none") => WordSwap::None,
        Some("word") | Some("swapped") => WordSwap::Swapped,
        Some(other) => {
            return Err(CatalogError::config(name, format!("unknown swap {:?}", other)));
        }
    };

    let cross_field = match (&spec.not_above, &spec.not_below) {
        (Some(_), Some(_)) => {
            return Err(CatalogError::config(
                name,
                "declare either not_above or not_below, not both",
            ));
        }
        (Some(partner), None) => Some(CrossFieldRule::NotAbove(partner.clone())),
        (None, Some(partner)) => Some(CrossFieldRule::NotBelow(partner.clone())),
        (None, None) => None,
    };

    let rules = WriteRules {
        safe_range: spec.safe_range.map(|range| SafeRange {
            min: range.min,
            max: range.max,
        }),
        legal_values: spec
            .legal_values
            .as_ref()
            .map(|values| values.iter().copied().collect()),
        cross_field,
    };

    let definition = RegisterDefinition {
        name: name.to_string(),
        address,
        function_code,
        data_type,
        word_count,
        scale: spec.scale,
        endianness,
        word_swap,
        unit: spec.unit.clone(),
        description: spec.description.clone(),
        writable: spec.writable,
        rules,
    };
    Ok((definition, conversion))
}

/// 定义级不变量
fn validate_definition(def: &RegisterDefinition, legacy: bool) -> Result<(), CatalogError> {
    let name = def.name.as_str();
    if name.trim().is_empty() {
        return Err(CatalogError::config(name, "register name must not be empty"));
    }

    validate_scale(def.scale)
        .map_err(|_| CatalogError::config(name, format!("scale must be nonzero and finite, got {}", def.scale)))?;

    match def.data_type.fixed_word_count() {
        Some(fixed) if def.word_count != fixed => {
            return Err(CatalogError::config(
                name,
                format!("word count {} does not match {}", def.word_count, def.data_type.tag()),
            ));
        }
        None if def.word_count == 0 => {
            return Err(CatalogError::config(name, "string registers need at least one word"));
        }
        _ => {}
    }

    if def.address as u32 + def.word_count as u32 - 1 > u16::MAX as u32 {
        return Err(CatalogError::config(name, "register span exceeds the address space"));
    }

    if def.function_code == FunctionCode::WriteSingle && !def.writable {
        return Err(CatalogError::config(name, "function_code 6 requires writable: true"));
    }

    if def.writable {
        if legacy {
            return Err(CatalogError::config(name, "legacy registers are read-only"));
        }
        if def.function_code == FunctionCode::ReadInput {
            return Err(CatalogError::config(name, "input registers cannot be writable"));
        }
        if !def.data_type.is_single_word() {
            return Err(CatalogError::config(
                name,
                format!("writable registers must be uint16 or int16, got {}", def.data_type.tag()),
            ));
        }
    } else if !def.rules.is_empty() {
        return Err(CatalogError::config(name, "write rules declared on a read-only register"));
    }

    validate_rules(def)
}

fn validate_rules(def: &RegisterDefinition) -> Result<(), CatalogError> {
    let name = def.name.as_str();
    if let Some(range) = def.rules.safe_range {
        if !range.min.is_finite() || !range.max.is_finite() || range.min > range.max {
            return Err(CatalogError::config(
                name,
                format!("invalid safe_range [{}, {}]", range.min, range.max),
            ));
        }
    }
    if let Some(values) = &def.rules.legal_values {
        if values.is_empty() {
            return Err(CatalogError::config(name, "legal_values must not be empty"));
        }
        if let Some((min, max)) = def.data_type.raw_bounds() {
            if let Some(bad) = values.iter().find(|value| **value < min || **value > max) {
                return Err(CatalogError::config(
                    name,
                    format!("legal value {} does not fit {}", bad, def.data_type.tag()),
                ));
            }
        }
    }
    if def.data_type == DataType::FixedString && !def.rules.is_empty() {
        return Err(CatalogError::config(name, "string registers take no write rules"));
    }
    Ok(())
}
