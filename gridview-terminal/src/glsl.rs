/// Parser for the small GLSL ES subset the software backend can execute
///
/// Supported: `precision` statements, `attribute`/`uniform`/`varying`
/// declarations, and a `main` whose body assigns `gl_Position` a chain of
/// matrix uniforms applied to `vec4(attribute, w)`, `gl_PointSize` a
/// constant, or `gl_FragColor` a constant `vec4`.
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::{all_consuming, map, opt, recognize, value, verify},
    multi::{many0, many0_count},
    number::complete::float,
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    IResult,
};

use gridview_core::ShaderStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Attribute,
    Uniform,
    Varying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlslType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub storage: Storage,
    pub ty: GlslType,
    pub name: String,
}

/// `M1 * M2 * ... * vec4(attribute, w)`
#[derive(Debug, Clone, PartialEq)]
pub struct PositionExpr {
    pub matrices: Vec<String>,
    pub attribute: String,
    pub w: f32,
}

#[derive(Debug, Clone, PartialEq)]
enum Statement {
    Position(PositionExpr),
    PointSize(f32),
    FragColor([f32; 4]),
}

#[derive(Debug, Clone, PartialEq)]
enum Item {
    Precision,
    Global(Declaration),
    Main(Vec<Statement>),
}

/// A successfully compiled shader stage
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderModule {
    pub stage: ShaderStage,
    pub declarations: Vec<Declaration>,
    pub position: Option<PositionExpr>,
    pub point_size: Option<f32>,
    pub frag_color: Option<[f32; 4]>,
}

impl ShaderModule {
    pub fn declared(&self, storage: Storage) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(move |d| d.storage == storage)
    }

    fn lookup(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.name == name)
    }
}

/// Compile `source` for `stage`, returning the info log on failure
pub fn compile(stage: ShaderStage, source: &str) -> Result<ShaderModule, String> {
    let stripped = strip_comments(source);
    let items = match translation_unit(&stripped) {
        Ok((_, items)) => items,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(syntax_error(&stripped, e.input));
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err("ERROR: 0:0: unexpected end of input".to_string());
        }
    };

    let mut module = ShaderModule {
        stage,
        declarations: Vec::new(),
        position: None,
        point_size: None,
        frag_color: None,
    };
    let mut has_main = false;

    for item in items {
        match item {
            Item::Precision => {}
            Item::Global(decl) => {
                if module.lookup(&decl.name).is_some() {
                    return Err(format!("ERROR: '{}' : redefinition", decl.name));
                }
                if decl.storage == Storage::Attribute && stage == ShaderStage::Fragment {
                    return Err(format!(
                        "ERROR: '{}' : attribute not allowed in fragment shader",
                        decl.name
                    ));
                }
                module.declarations.push(decl);
            }
            Item::Main(body) => {
                if has_main {
                    return Err("ERROR: 'main' : function already has a body".to_string());
                }
                has_main = true;
                for statement in body {
                    apply_statement(&mut module, statement)?;
                }
            }
        }
    }

    if !has_main {
        return Err("ERROR: missing main() function".to_string());
    }
    match stage {
        ShaderStage::Vertex if module.position.is_none() => {
            Err("ERROR: vertex shader does not write gl_Position".to_string())
        }
        ShaderStage::Fragment if module.frag_color.is_none() => {
            Err("ERROR: fragment shader does not write gl_FragColor".to_string())
        }
        _ => Ok(module),
    }
}

fn apply_statement(module: &mut ShaderModule, statement: Statement) -> Result<(), String> {
    match (module.stage, statement) {
        (ShaderStage::Vertex, Statement::Position(expr)) => {
            for name in &expr.matrices {
                match module.lookup(name) {
                    Some(d) if d.storage == Storage::Uniform && d.ty == GlslType::Mat4 => {}
                    Some(_) => {
                        return Err(format!("ERROR: '{name}' : expected uniform mat4"));
                    }
                    None => return Err(format!("ERROR: '{name}' : undeclared identifier")),
                }
            }
            match module.lookup(&expr.attribute) {
                Some(d) if d.storage == Storage::Attribute && d.ty == GlslType::Vec3 => {}
                Some(_) => {
                    return Err(format!(
                        "ERROR: '{}' : expected attribute vec3",
                        expr.attribute
                    ));
                }
                None => {
                    return Err(format!(
                        "ERROR: '{}' : undeclared identifier",
                        expr.attribute
                    ));
                }
            }
            module.position = Some(expr);
        }
        (ShaderStage::Vertex, Statement::PointSize(size)) => module.point_size = Some(size),
        (ShaderStage::Fragment, Statement::FragColor(color)) => module.frag_color = Some(color),
        (stage, Statement::Position(_)) | (stage, Statement::PointSize(_)) => {
            return Err(format!("ERROR: vertex output written in {stage} shader"));
        }
        (stage, Statement::FragColor(_)) => {
            return Err(format!("ERROR: gl_FragColor written in {stage} shader"));
        }
    }
    Ok(())
}

fn syntax_error(source: &str, remaining: &str) -> String {
    let offset = source.len() - remaining.len();
    let line = source[..offset].matches('\n').count() + 1;
    let near: String = remaining
        .trim_start()
        .chars()
        .take_while(|c| !c.is_whitespace())
        .take(24)
        .collect();
    if near.is_empty() {
        format!("ERROR: 0:{line}: syntax error")
    } else {
        format!("ERROR: 0:{line}: '{near}' : syntax error")
    }
}

/// Blank out `//` and `/* */` comments, keeping newlines so line numbers hold
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        let next = chars.peek().copied();
        match (c, next) {
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = ' ';
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    verify(identifier, move |s: &str| s == kw)
}

fn glsl_type(input: &str) -> IResult<&str, GlslType> {
    alt((
        value(GlslType::Float, keyword("float")),
        value(GlslType::Vec2, keyword("vec2")),
        value(GlslType::Vec3, keyword("vec3")),
        value(GlslType::Vec4, keyword("vec4")),
        value(GlslType::Mat4, keyword("mat4")),
    ))(input)
}

fn storage(input: &str) -> IResult<&str, Storage> {
    alt((
        value(Storage::Attribute, keyword("attribute")),
        value(Storage::Uniform, keyword("uniform")),
        value(Storage::Varying, keyword("varying")),
    ))(input)
}

fn precision(input: &str) -> IResult<&str, Item> {
    value(
        Item::Precision,
        tuple((
            ws(keyword("precision")),
            ws(alt((keyword("lowp"), keyword("mediump"), keyword("highp")))),
            ws(glsl_type),
            ws(char(';')),
        )),
    )(input)
}

fn global(input: &str) -> IResult<&str, Item> {
    map(
        tuple((ws(storage), ws(glsl_type), ws(identifier), ws(char(';')))),
        |(storage, ty, name, _)| {
            Item::Global(Declaration {
                storage,
                ty,
                name: name.to_string(),
            })
        },
    )(input)
}

fn vec4_call(input: &str) -> IResult<&str, (&str, f32)> {
    delimited(
        pair(ws(keyword("vec4")), ws(char('('))),
        separated_pair(ws(identifier), ws(char(',')), ws(float)),
        ws(char(')')),
    )(input)
}

fn position_expr(input: &str) -> IResult<&str, PositionExpr> {
    map(
        pair(many0(terminated(ws(identifier), ws(char('*')))), vec4_call),
        |(matrices, (attribute, w))| PositionExpr {
            matrices: matrices.into_iter().map(str::to_string).collect(),
            attribute: attribute.to_string(),
            w,
        },
    )(input)
}

fn vec4_literal(input: &str) -> IResult<&str, [f32; 4]> {
    map(
        delimited(
            pair(ws(keyword("vec4")), ws(char('('))),
            tuple((
                ws(float),
                preceded(ws(char(',')), ws(float)),
                preceded(ws(char(',')), ws(float)),
                preceded(ws(char(',')), ws(float)),
            )),
            ws(char(')')),
        ),
        |(r, g, b, a)| [r, g, b, a],
    )(input)
}

fn assignment<'a, O, F>(
    target: &'static str,
    rhs: F,
) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(
        pair(ws(keyword(target)), ws(char('='))),
        rhs,
        ws(char(';')),
    )
}

fn statement(input: &str) -> IResult<&str, Statement> {
    alt((
        map(assignment("gl_Position", position_expr), Statement::Position),
        map(assignment("gl_PointSize", ws(float)), Statement::PointSize),
        map(assignment("gl_FragColor", vec4_literal), Statement::FragColor),
    ))(input)
}

fn main_fn(input: &str) -> IResult<&str, Item> {
    map(
        tuple((
            ws(keyword("void")),
            ws(keyword("main")),
            ws(char('(')),
            opt(ws(keyword("void"))),
            ws(char(')')),
            ws(char('{')),
            many0(statement),
            ws(char('}')),
        )),
        |(_, _, _, _, _, _, body, _)| Item::Main(body),
    )(input)
}

fn translation_unit(input: &str) -> IResult<&str, Vec<Item>> {
    all_consuming(terminated(
        many0(alt((precision, global, main_fn))),
        multispace0,
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridview_core::shader::{FRAGMENT_SHADER_SOURCE, VERTEX_SHADER_SOURCE};

    #[test]
    fn test_default_vertex_shader() {
        let module = compile(ShaderStage::Vertex, VERTEX_SHADER_SOURCE).unwrap();
        let position = module.position.as_ref().unwrap();
        assert_eq!(position.matrices, vec!["projectionMatrix", "modelViewMatrix"]);
        assert_eq!(position.attribute, "coordinates");
        assert_eq!(position.w, 1.0);
        assert_eq!(module.point_size, Some(3.0));
        assert_eq!(module.declared(Storage::Uniform).count(), 2);
    }

    #[test]
    fn test_default_fragment_shader() {
        let module = compile(ShaderStage::Fragment, FRAGMENT_SHADER_SOURCE).unwrap();
        assert_eq!(module.frag_color, Some([0.0, 1.0, 0.0, 1.0]));
    }

    #[test]
    fn test_comments_are_ignored() {
        let source = "precision mediump float;\n/* block\ncomment */\nvoid main() {\n  gl_FragColor = vec4(1.0, 0.0, 0.0, 1.0); // red\n}\n";
        let module = compile(ShaderStage::Fragment, source).unwrap();
        assert_eq!(module.frag_color, Some([1.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_syntax_error_reports_line() {
        let source = "attribute vec3 coordinates;\nvoid main() {\n  gl_Position = vec4(coordinates 1.0);\n}\n";
        let log = compile(ShaderStage::Vertex, source).unwrap_err();
        assert!(log.starts_with("ERROR: 0:2:"), "{log}");
    }

    #[test]
    fn test_undeclared_identifier() {
        let source = "attribute vec3 coordinates;\nvoid main(void) {\n  gl_Position = mvp * vec4(coordinates, 1.0);\n}\n";
        let log = compile(ShaderStage::Vertex, source).unwrap_err();
        assert_eq!(log, "ERROR: 'mvp' : undeclared identifier");
    }

    #[test]
    fn test_wrong_attribute_type() {
        let source = "attribute vec2 coordinates;\nvoid main() { gl_Position = vec4(coordinates, 1.0); }";
        let log = compile(ShaderStage::Vertex, source).unwrap_err();
        assert!(log.contains("expected attribute vec3"));
    }

    #[test]
    fn test_missing_outputs() {
        assert!(compile(ShaderStage::Vertex, "void main() {}")
            .unwrap_err()
            .contains("gl_Position"));
        assert!(compile(ShaderStage::Fragment, "void main(void) { }")
            .unwrap_err()
            .contains("gl_FragColor"));
        assert!(compile(ShaderStage::Fragment, "precision highp float;")
            .unwrap_err()
            .contains("main"));
    }

    #[test]
    fn test_stage_mismatch() {
        let log = compile(ShaderStage::Vertex, FRAGMENT_SHADER_SOURCE).unwrap_err();
        assert!(log.contains("gl_FragColor written in vertex shader"));
        let log = compile(ShaderStage::Fragment, VERTEX_SHADER_SOURCE).unwrap_err();
        assert!(log.contains("attribute not allowed"));
    }

    #[test]
    fn test_keyword_needs_word_boundary() {
        assert!(compile(ShaderStage::Fragment, "uniformx mat4 m; void main() { gl_FragColor = vec4(0.0, 0.0, 0.0, 1.0); }").is_err());
    }

    #[test]
    fn test_redefinition() {
        let source = "uniform mat4 m;\nuniform mat4 m;\nvoid main() { gl_FragColor = vec4(0.0, 0.0, 0.0, 1.0); }";
        assert!(compile(ShaderStage::Fragment, source).unwrap_err().contains("redefinition"));
    }
}
