//! Loads the `{etype: {attr_id: AttrSpec}}` tree from a directory of YAML
//! documents: one subdirectory per entity type, one `<attr_id>.yaml` file
//! per attribute.

use std::path::Path;

use dp3_history_core::attrspec::RawAttrSpec;
use dp3_history_core::AttrSpec;
use dp3_history_manager::AttrSpecMap;

pub fn load_dir(dir: &Path) -> anyhow::Result<AttrSpecMap> {
    let mut attr_spec = AttrSpecMap::new();

    if !dir.is_dir() {
        tracing::warn!(dir = %dir.display(), "attrspec directory not found, starting with an empty spec tree");
        return Ok(attr_spec);
    }

    for etype_entry in std::fs::read_dir(dir)? {
        let etype_entry = etype_entry?;
        if !etype_entry.file_type()?.is_dir() {
            continue;
        }
        let etype = etype_entry.file_name().to_string_lossy().into_owned();
        let mut attrs = std::collections::BTreeMap::new();

        for attr_entry in std::fs::read_dir(etype_entry.path())? {
            let attr_entry = attr_entry?;
            let path = attr_entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let attr_id = path
                .file_stem()
                .ok_or_else(|| anyhow::anyhow!("attrspec file has no stem: {}", path.display()))?
                .to_string_lossy()
                .into_owned();

            let raw: RawAttrSpec = serde_yaml::from_str(&std::fs::read_to_string(&path)?)?;
            let spec = AttrSpec::new(attr_id.clone(), raw)
                .map_err(|e| anyhow::anyhow!("{etype}/{attr_id}: {e}"))?;
            attrs.insert(attr_id, spec);
        }

        tracing::info!(etype = %etype, count = attrs.len(), "loaded attribute specs");
        attr_spec.insert(etype, attrs);
    }

    Ok(attr_spec)
}
