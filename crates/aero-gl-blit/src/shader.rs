//! Blit shader synthesis and the compiled program cache.

use std::collections::HashMap;

use crate::device::{GlDevice, GlStandard, ProgramId, ShaderId, ShaderStage, UniformLocation};
use crate::error::BlitError;
use crate::format::ComponentType;

/// Which sampler/output pair a blit program uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlitVariant {
    /// `sampler2D` in, normalized/float color out.
    FloatToFloat,
    /// `sampler2D` in, `uvec4` out scaled by 255.
    FloatToUint,
    /// `usampler2D` in, `uvec4` out.
    UintToUint,
}

impl BlitVariant {
    /// Picks the variant for copying between textures with the given component types.
    ///
    /// An unsigned-integer source always selects [`BlitVariant::UintToUint`]: integer textures
    /// can only be sampled through `usampler2D`. Signed integer textures are not supported on
    /// either side.
    pub fn select(source: ComponentType, dest: ComponentType) -> Result<Self, BlitError> {
        match (source, dest) {
            (ComponentType::Int, _) | (_, ComponentType::Int) => {
                Err(BlitError::UnsupportedComponentType(ComponentType::Int))
            }
            (ComponentType::UnsignedInt, _) => Ok(Self::UintToUint),
            (_, ComponentType::UnsignedInt) => Ok(Self::FloatToUint),
            _ => Ok(Self::FloatToFloat),
        }
    }

    pub fn outputs_integer(self) -> bool {
        !matches!(self, Self::FloatToFloat)
    }
}

/// GLSL source for one blit program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlitShaderSource {
    pub vertex: String,
    pub fragment: String,
}

/// Generates the blit program for `variant`. Pure: equal inputs always give equal sources.
pub fn synthesize(variant: BlitVariant, standard: GlStandard) -> BlitShaderSource {
    if !variant.outputs_integer() {
        return BlitShaderSource {
            vertex: vertex_source("#version 100", "attribute", "varying"),
            fragment: fragment_source(
                "#version 100",
                "varying",
                "",
                "sampler2D",
                "texture2D(u_source_texture, v_texcoord)",
                "gl_FragColor = color;",
            ),
        };
    }

    let version = match standard {
        GlStandard::Desktop => "#version 330",
        GlStandard::Es => "#version 300 es",
    };
    let (sampler, sample) = match variant {
        BlitVariant::UintToUint => (
            "usampler2D",
            "vec4(texture(u_source_texture, v_texcoord)) / 255.0",
        ),
        _ => ("sampler2D", "texture(u_source_texture, v_texcoord)"),
    };
    BlitShaderSource {
        vertex: vertex_source(version, "in", "out"),
        fragment: fragment_source(
            version,
            "in",
            "precision highp usampler2D;\nout uvec4 outputUint;\n",
            sampler,
            sample,
            "outputUint = uvec4(round(color * 255.0));",
        ),
    }
}

fn vertex_source(version: &str, attribute: &str, varying: &str) -> String {
    format!(
        "{version}
{attribute} vec2 a_texcoord;
uniform vec2 u_scale;
uniform vec2 u_offset;
{varying} vec2 v_texcoord;

void main()
{{
    gl_Position = vec4((a_texcoord * 2.0) - 1.0, 0.0, 1.0);
    v_texcoord = a_texcoord * u_scale + u_offset;
}}
"
    )
}

fn fragment_source(
    version: &str,
    varying: &str,
    output_decl: &str,
    sampler: &str,
    sample: &str,
    write_output: &str,
) -> String {
    format!(
        "{version}
precision highp float;
{output_decl}uniform {sampler} u_source_texture;
uniform bool u_multiply_alpha;
uniform bool u_unmultiply_alpha;
{varying} vec2 v_texcoord;

void main()
{{
    if (clamp(v_texcoord, vec2(0.0), vec2(1.0)) != v_texcoord)
    {{
        discard;
    }}
    vec4 color = {sample};
    if (u_multiply_alpha)
    {{
        color.xyz = color.xyz * color.a;
    }}
    if (u_unmultiply_alpha && color.a != 0.0)
    {{
        color.xyz = color.xyz / color.a;
    }}
    {write_output}
}}
"
    )
}

/// A linked blit program plus its uniform locations. Locations the linker optimized out are
/// `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompiledBlitProgram {
    pub program: ProgramId,
    pub source_texture: Option<UniformLocation>,
    pub scale: Option<UniformLocation>,
    pub offset: Option<UniformLocation>,
    pub multiply_alpha: Option<UniformLocation>,
    pub unmultiply_alpha: Option<UniformLocation>,
}

/// Compiled blit programs, one per [`BlitVariant`]. Entries are never recompiled or mutated.
#[derive(Debug, Default)]
pub struct ProgramCache {
    programs: HashMap<BlitVariant, CompiledBlitProgram>,
    hits: u64,
    misses: u64,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn get(&self, variant: BlitVariant) -> Option<CompiledBlitProgram> {
        self.programs.get(&variant).copied()
    }

    pub fn get_or_create<D: GlDevice + ?Sized>(
        &mut self,
        device: &mut D,
        variant: BlitVariant,
    ) -> Result<CompiledBlitProgram, BlitError> {
        if let Some(program) = self.programs.get(&variant) {
            self.hits += 1;
            return Ok(*program);
        }
        self.misses += 1;

        let source = synthesize(variant, device.standard());
        let program = link_program(device, &source)?;
        tracing::debug!(?variant, program = program.program.0, "compiled blit program");
        self.programs.insert(variant, program);
        Ok(program)
    }

    /// Deletes every cached program.
    pub fn release<D: GlDevice + ?Sized>(&mut self, device: &mut D) {
        for (_, program) in self.programs.drain() {
            device.delete_program(program.program);
        }
    }
}

fn compile_shader<D: GlDevice + ?Sized>(
    device: &mut D,
    stage: ShaderStage,
    source: &str,
) -> Result<ShaderId, BlitError> {
    let shader = device.create_shader(stage)?;
    device.shader_source(shader, source);
    device.compile_shader(shader);
    if !device.shader_compile_status(shader) {
        let log = device.shader_info_log(shader);
        device.delete_shader(shader);
        return Err(BlitError::ShaderCompile { stage, log });
    }
    Ok(shader)
}

fn link_program<D: GlDevice + ?Sized>(
    device: &mut D,
    source: &BlitShaderSource,
) -> Result<CompiledBlitProgram, BlitError> {
    let vertex = compile_shader(device, ShaderStage::Vertex, &source.vertex)?;
    let fragment = match compile_shader(device, ShaderStage::Fragment, &source.fragment) {
        Ok(shader) => shader,
        Err(err) => {
            device.delete_shader(vertex);
            return Err(err);
        }
    };

    let program = match device.create_program() {
        Ok(program) => program,
        Err(err) => {
            device.delete_shader(vertex);
            device.delete_shader(fragment);
            return Err(err.into());
        }
    };
    device.attach_shader(program, vertex);
    device.attach_shader(program, fragment);
    device.link_program(program);
    // Attached shaders stay alive until the program is deleted.
    device.delete_shader(vertex);
    device.delete_shader(fragment);

    if !device.program_link_status(program) {
        let log = device.program_info_log(program);
        device.delete_program(program);
        return Err(BlitError::ProgramLink { log });
    }

    let compiled = CompiledBlitProgram {
        program,
        source_texture: device.uniform_location(program, "u_source_texture"),
        scale: device.uniform_location(program, "u_scale"),
        offset: device.uniform_location(program, "u_offset"),
        multiply_alpha: device.uniform_location(program, "u_multiply_alpha"),
        unmultiply_alpha: device.uniform_location(program, "u_unmultiply_alpha"),
    };

    // The source texture is always on unit 0.
    device.use_program(Some(program));
    device.uniform_1_i32(compiled.source_texture, 0);
    Ok(compiled)
}
