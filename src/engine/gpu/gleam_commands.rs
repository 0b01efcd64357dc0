//! ### English
//! `GpuCommands` over a gleam GL function table.
//!
//! ### 中文
//! 基于 gleam GL 函数表的 `GpuCommands` 实现。

use std::rc::Rc;

use dpi::PhysicalSize;
use gleam::gl::{self, Gl};

use crate::engine::error::RenderError;
use crate::engine::frame::ImageFrame;

use super::{GpuCommands, SampleTarget, TextureId};

const MAX_QUEUED_ERRORS: usize = 16;

/// ### English
/// gleam-backed GL commands bound to one context.
///
/// ### 中文
/// 绑定到单个上下文、基于 gleam 的 GL 命令。
pub struct GleamCommands {
    gl: Rc<dyn Gl>,
    /// ### English
    /// Framebuffer of the presentation surface (not always `0` on surfman surfaces).
    ///
    /// ### 中文
    /// 呈现表面的 framebuffer（在 surfman 表面上不一定是 `0`）。
    default_framebuffer: gl::GLuint,
}

impl GleamCommands {
    pub fn new(gl: Rc<dyn Gl>, default_framebuffer: gl::GLuint) -> Self {
        Self {
            gl,
            default_framebuffer,
        }
    }

    pub fn gl(&self) -> Rc<dyn Gl> {
        self.gl.clone()
    }

    fn allocate_texture(&self, texture: gl::GLuint, size: PhysicalSize<u32>, data: Option<&[u8]>) {
        self.gl.bind_texture(gl::TEXTURE_2D, texture);
        self.gl.tex_image_2d(
            gl::TEXTURE_2D,
            0,
            gl::RGBA as gl::GLint,
            size.width as gl::GLsizei,
            size.height as gl::GLsizei,
            0,
            gl::RGBA,
            gl::UNSIGNED_BYTE,
            data,
        );
    }

    fn framebuffer_for(&self, texture: gl::GLuint) -> Result<gl::GLuint, RenderError> {
        let framebuffer = self.gl.gen_framebuffers(1)[0];
        self.gl.bind_framebuffer(gl::FRAMEBUFFER, framebuffer);
        self.gl.framebuffer_texture_2d(
            gl::FRAMEBUFFER,
            gl::COLOR_ATTACHMENT0,
            gl::TEXTURE_2D,
            texture,
            0,
        );
        let status = self.gl.check_frame_buffer_status(gl::FRAMEBUFFER);
        self.gl
            .bind_framebuffer(gl::FRAMEBUFFER, self.default_framebuffer);
        if status != gl::FRAMEBUFFER_COMPLETE {
            self.gl.delete_framebuffers(&[framebuffer]);
            return Err(RenderError::GraphicsApiError(format!(
                "incomplete sample framebuffer: 0x{status:04x}"
            )));
        }
        Ok(framebuffer)
    }
}

impl GpuCommands for GleamCommands {
    fn create_frame_texture(&self, size: PhysicalSize<u32>) -> Result<TextureId, RenderError> {
        let texture = self.gl.gen_textures(1)[0];
        self.allocate_texture(texture, size, None);
        for (name, value) in [
            (gl::TEXTURE_MIN_FILTER, gl::LINEAR),
            (gl::TEXTURE_MAG_FILTER, gl::LINEAR),
            (gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE),
            (gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE),
        ] {
            self.gl
                .tex_parameter_i(gl::TEXTURE_2D, name, value as gl::GLint);
        }
        self.gl.bind_texture(gl::TEXTURE_2D, 0);
        self.check_error().inspect_err(|_| {
            self.gl.delete_textures(&[texture]);
        })?;
        Ok(texture)
    }

    fn upload_frame(&self, texture: TextureId, frame: &ImageFrame, reallocate: bool) {
        self.gl.pixel_store_i(gl::UNPACK_ALIGNMENT, 1);
        if reallocate {
            self.allocate_texture(texture, frame.size, Some(&frame.pixels));
        } else {
            self.gl.bind_texture(gl::TEXTURE_2D, texture);
            self.gl.tex_sub_image_2d(
                gl::TEXTURE_2D,
                0,
                0,
                0,
                frame.size.width as gl::GLsizei,
                frame.size.height as gl::GLsizei,
                gl::RGBA,
                gl::UNSIGNED_BYTE,
                &frame.pixels,
            );
        }
        self.gl.bind_texture(gl::TEXTURE_2D, 0);
    }

    fn delete_texture(&self, texture: TextureId) {
        self.gl.delete_textures(&[texture]);
    }

    fn create_sample_target(
        &self,
        source: TextureId,
        size: PhysicalSize<u32>,
    ) -> Result<SampleTarget, RenderError> {
        let texture = self.gl.gen_textures(1)[0];
        self.allocate_texture(texture, size, None);
        self.gl.bind_texture(gl::TEXTURE_2D, 0);

        let framebuffer = self.framebuffer_for(texture).inspect_err(|_| {
            self.gl.delete_textures(&[texture]);
        })?;
        let source_framebuffer = self.framebuffer_for(source).inspect_err(|_| {
            self.gl.delete_framebuffers(&[framebuffer]);
            self.gl.delete_textures(&[texture]);
        })?;

        Ok(SampleTarget {
            framebuffer,
            texture,
            source_framebuffer,
            source,
            size,
        })
    }

    fn delete_sample_target(&self, target: &SampleTarget) {
        self.gl
            .delete_framebuffers(&[target.framebuffer, target.source_framebuffer]);
        self.gl.delete_textures(&[target.texture]);
    }

    fn set_viewport(&self, size: PhysicalSize<u32>) {
        self.gl
            .viewport(0, 0, size.width as gl::GLsizei, size.height as gl::GLsizei);
    }

    fn read_sample(&self, target: &SampleTarget, source_size: PhysicalSize<u32>) -> Vec<u8> {
        let width = target.size.width as gl::GLint;
        let height = target.size.height as gl::GLint;

        self.gl
            .bind_framebuffer(gl::READ_FRAMEBUFFER, target.source_framebuffer);
        self.gl
            .bind_framebuffer(gl::DRAW_FRAMEBUFFER, target.framebuffer);
        self.gl.blit_framebuffer(
            0,
            0,
            source_size.width as gl::GLint,
            source_size.height as gl::GLint,
            0,
            0,
            width,
            height,
            gl::COLOR_BUFFER_BIT,
            gl::LINEAR,
        );

        self.gl.bind_framebuffer(gl::FRAMEBUFFER, target.framebuffer);
        self.gl.pixel_store_i(gl::PACK_ALIGNMENT, 1);
        let pixels = self
            .gl
            .read_pixels(0, 0, width, height, gl::RGBA, gl::UNSIGNED_BYTE);
        self.gl
            .bind_framebuffer(gl::FRAMEBUFFER, self.default_framebuffer);
        pixels
    }

    fn check_error(&self) -> Result<(), RenderError> {
        // Bounded: a lost context may keep reporting errors.
        let mut first = None;
        for _ in 0..MAX_QUEUED_ERRORS {
            let code = self.gl.get_error();
            if code == gl::NO_ERROR {
                break;
            }
            first.get_or_insert(code);
        }

        match first {
            None => Ok(()),
            Some(code) => Err(RenderError::GraphicsApiError(format!(
                "GL error 0x{code:04x}"
            ))),
        }
    }
}
