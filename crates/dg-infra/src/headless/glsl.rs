// Copyright 2025 The DG Engine Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A declaration scanner standing in for a GLSL compiler.
//!
//! It does not type-check shader bodies. It recognizes the parts of a stage
//! the device needs to honor the uniform contract: the entry point, `uniform`
//! declarations, and `#error` / `#warning` directives.

use dg_core::renderer::ShaderStage;

/// One declared uniform, possibly an array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UniformDecl {
    pub name: String,
    pub ty: String,
    /// `None` for scalars, `Some(n)` for `name[n]`.
    pub array_len: Option<usize>,
}

/// The outcome of compiling one stage.
#[derive(Debug, Clone)]
pub(crate) struct CompiledStage {
    pub stage: ShaderStage,
    pub uniforms: Vec<UniformDecl>,
    pub warnings: String,
}

const PRECISION_QUALIFIERS: [&str; 3] = ["lowp", "mediump", "highp"];

/// Compiles a stage, returning the stage or the error log.
pub(crate) fn compile(stage: ShaderStage, source: &str) -> Result<CompiledStage, String> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut code = String::with_capacity(source.len());

    for (index, raw) in source.lines().enumerate() {
        let line = strip_comment(raw);
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("#error") {
            errors.push(format!("ERROR: 0:{}: '#error' : {}", index + 1, rest.trim()));
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("#warning") {
            warnings.push(format!("WARNING: 0:{}: {}", index + 1, rest.trim()));
            continue;
        }
        if trimmed.starts_with('#') {
            continue;
        }
        code.push_str(line);
        code.push('\n');
    }

    if !has_entry_point(&code) {
        errors.push("ERROR: 0:0: missing entry point 'main'".to_string());
    }

    let mut uniforms = Vec::new();
    for statement in code.split(';') {
        match parse_uniform(statement) {
            Some(Ok(decl)) => uniforms.push(decl),
            Some(Err(msg)) => errors.push(format!("ERROR: {msg}")),
            None => {}
        }
    }

    if errors.is_empty() {
        Ok(CompiledStage {
            stage,
            uniforms,
            warnings: warnings.join("\n"),
        })
    } else {
        Err(errors.join("\n"))
    }
}

/// Merges the uniforms of two stages, rejecting conflicting redeclarations.
pub(crate) fn link(vertex: &CompiledStage, fragment: &CompiledStage) -> Result<Vec<UniformDecl>, String> {
    if vertex.stage != ShaderStage::Vertex || fragment.stage != ShaderStage::Fragment {
        return Err(format!(
            "ERROR: expected a vertex and a fragment stage, got {} and {}",
            vertex.stage, fragment.stage
        ));
    }

    let mut merged: Vec<UniformDecl> = Vec::new();
    for decl in vertex.uniforms.iter().chain(&fragment.uniforms) {
        match merged.iter().find(|d| d.name == decl.name) {
            Some(existing) if existing != decl => {
                return Err(format!(
                    "ERROR: uniform '{}' declared with conflicting types '{}' and '{}'",
                    decl.name,
                    describe(existing),
                    describe(decl)
                ));
            }
            Some(_) => {}
            None => merged.push(decl.clone()),
        }
    }
    Ok(merged)
}

fn describe(decl: &UniformDecl) -> String {
    match decl.array_len {
        Some(n) => format!("{}[{n}]", decl.ty),
        None => decl.ty.clone(),
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn has_entry_point(code: &str) -> bool {
    code.match_indices("main").any(|(pos, _)| {
        let before = code[..pos].chars().next_back();
        let after = code[pos + 4..].trim_start();
        !before.is_some_and(|c| c.is_alphanumeric() || c == '_') && after.starts_with('(')
    })
}

/// Parses `uniform [precision] <type> <name>[N]?`. Returns `None` when the
/// statement is not a uniform declaration.
fn parse_uniform(statement: &str) -> Option<Result<UniformDecl, String>> {
    let mut statement = statement.trim_start_matches(|c: char| c == '}' || c.is_whitespace());
    if statement.starts_with("layout") {
        let close = statement.find(')')?;
        statement = statement[close + 1..].trim_start();
    }
    let rest = statement.strip_prefix("uniform")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut tokens = rest
        .split_whitespace()
        .filter(|t| !PRECISION_QUALIFIERS.contains(t));
    let Some(ty) = tokens.next() else {
        return Some(Err("uniform declaration without a type".to_string()));
    };
    let declarator: String = tokens.collect();
    if declarator.is_empty() {
        return Some(Err(format!("uniform of type '{ty}' has no name")));
    }

    let (name, array_len) = match declarator.split_once('[') {
        Some((name, len)) => {
            let Some(len) = len.strip_suffix(']').and_then(|l| l.parse::<usize>().ok()) else {
                return Some(Err(format!("malformed array size in '{declarator}'")));
            };
            if len == 0 {
                return Some(Err(format!("array '{name}' must have a size above zero")));
            }
            (name.to_string(), Some(len))
        }
        None => (declarator, None),
    };

    Some(Ok(UniformDecl {
        name,
        ty: ty.to_string(),
        array_len,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = "#version 450 core\n\
        layout(location = 0) in vec3 in_Position;\n\
        uniform mat4 uni_CameraProduct; // camera\n\
        void main () { gl_Position = uni_CameraProduct * vec4(in_Position, 1.0); }\n";

    const FRAGMENT: &str = "#version 450 core\n\
        uniform highp sampler2D uni_TexSlots[16];\n\
        uniform mat4 uni_CameraProduct;\n\
        out vec4 out_Color;\n\
        void main() { out_Color = vec4(1.0); }\n";

    #[test]
    fn collects_uniform_declarations() {
        let vs = compile(ShaderStage::Vertex, VERTEX).unwrap();
        assert_eq!(
            vs.uniforms,
            vec![UniformDecl {
                name: "uni_CameraProduct".into(),
                ty: "mat4".into(),
                array_len: None
            }]
        );
        let fs = compile(ShaderStage::Fragment, FRAGMENT).unwrap();
        assert_eq!(fs.uniforms[0].ty, "sampler2D");
        assert_eq!(fs.uniforms[0].array_len, Some(16));
    }

    #[test]
    fn missing_main_is_an_error() {
        let err = compile(ShaderStage::Vertex, "uniform float x;\nvoid entry() {}\n").unwrap_err();
        assert!(err.contains("main"));
        assert!(compile(ShaderStage::Vertex, "void domain() {}").is_err());
    }

    #[test]
    fn error_and_warning_directives() {
        let err = compile(ShaderStage::Fragment, "#error broken\nvoid main() {}").unwrap_err();
        assert!(err.contains("'#error' : broken"));

        let ok = compile(ShaderStage::Fragment, "#warning slow path\nvoid main() {}").unwrap();
        assert!(ok.warnings.contains("slow path"));
    }

    #[test]
    fn link_rejects_conflicting_types() {
        let vs = compile(ShaderStage::Vertex, "uniform vec4 u_Tint;\nvoid main() {}").unwrap();
        let fs = compile(ShaderStage::Fragment, "uniform vec3 u_Tint;\nvoid main() {}").unwrap();
        let err = link(&vs, &fs).unwrap_err();
        assert!(err.contains("u_Tint"));
    }

    #[test]
    fn link_merges_shared_uniforms() {
        let vs = compile(ShaderStage::Vertex, VERTEX).unwrap();
        let fs = compile(ShaderStage::Fragment, FRAGMENT).unwrap();
        let uniforms = link(&vs, &fs).unwrap();
        assert_eq!(uniforms.len(), 2);
        assert!(link(&fs, &vs).is_err());
    }
}
