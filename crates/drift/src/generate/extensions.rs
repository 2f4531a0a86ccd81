//! Extensions.
//!
//! Extensions are matched by name. Moving one to another schema or pinning
//! another version drops and creates it again.

use crate::script::Op;
use crate::Result;

use super::Run;

pub fn generate(run: &mut Run<'_>) -> Result<()> {
    let desired = run.desired;
    for ext in &desired.extensions {
        let create = Op::CreateExtension {
            name: ext.name.clone(),
            schema: ext.schema.clone(),
            version: ext.version.clone(),
        };
        let Some(found) = run.actual.extensions.iter().find(|e| e.name == ext.name) else {
            run.push(create);
            continue;
        };

        let moved = ext.schema.as_ref().is_some_and(|s| *s != found.schema);
        let upgraded = ext.version.as_ref().is_some_and(|v| *v != found.version);
        if moved || upgraded {
            tracing::debug!(extension = %ext.name, moved, upgraded, "recreating extension");
            run.push(Op::DropExtension {
                name: ext.name.clone(),
            });
            run.push(create);
        }
    }

    let extra: Vec<String> = run
        .actual
        .extensions
        .iter()
        .filter(|e| !desired.extensions.iter().any(|d| d.name == e.name))
        .map(|e| e.name.clone())
        .collect();
    run.drops.extensions.extend(extra);
    Ok(())
}
