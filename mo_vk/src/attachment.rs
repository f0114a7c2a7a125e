use crate::error::{VkError, VkResult, VkResultExt};
use crate::texture::Texture;
use std::sync::Arc;
use vulkano::device::Device;
use vulkano::format::Format;
use vulkano::image::ImageLayout;
use vulkano::render_pass::{
    AttachmentDescription, AttachmentLoadOp, AttachmentReference, AttachmentStoreOp, RenderPass,
    RenderPassCreateInfo, SubpassDescription,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentRole {
    Color,
    Depth,
}

/// One attachment of a single-subpass render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentSpec {
    pub format: Format,
    pub role: AttachmentRole,
    pub load_op: AttachmentLoadOp,
    pub store_op: AttachmentStoreOp,
    pub final_layout: ImageLayout,
}

impl AttachmentSpec {
    /// Cleared color target, sampled by a later pass.
    pub fn color(format: Format) -> Self {
        Self {
            format,
            role: AttachmentRole::Color,
            load_op: AttachmentLoadOp::Clear,
            store_op: AttachmentStoreOp::Store,
            final_layout: ImageLayout::ShaderReadOnlyOptimal,
        }
    }

    /// Cleared depth buffer whose contents are thrown away after the pass.
    pub fn depth(format: Format) -> Self {
        Self {
            format,
            role: AttachmentRole::Depth,
            load_op: AttachmentLoadOp::Clear,
            store_op: AttachmentStoreOp::DontCare,
            final_layout: ImageLayout::DepthStencilAttachmentOptimal,
        }
    }

    pub fn with_store_op(mut self, store_op: AttachmentStoreOp) -> Self {
        self.store_op = store_op;
        self
    }

    pub fn with_final_layout(mut self, final_layout: ImageLayout) -> Self {
        self.final_layout = final_layout;
        self
    }

    fn subpass_layout(&self) -> ImageLayout {
        match self.role {
            AttachmentRole::Color => ImageLayout::ColorAttachmentOptimal,
            AttachmentRole::Depth => ImageLayout::DepthStencilAttachmentOptimal,
        }
    }
}

/// Ordered attachments of a render pass: colors first, then at most one depth attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentSet {
    attachments: Vec<AttachmentSpec>,
}

impl AttachmentSet {
    pub fn new(attachments: Vec<AttachmentSpec>) -> VkResult<Self> {
        if attachments.is_empty() {
            return Err(VkError::InvalidAttachments(
                "a render pass needs at least one attachment".into(),
            ));
        }

        let depth_count = attachments
            .iter()
            .filter(|a| a.role == AttachmentRole::Depth)
            .count();
        if depth_count > 1 {
            return Err(VkError::InvalidAttachments(format!(
                "{depth_count} depth attachments, at most one is allowed"
            )));
        }
        if let Some(position) = attachments
            .iter()
            .position(|a| a.role == AttachmentRole::Depth)
        {
            if position != attachments.len() - 1 {
                return Err(VkError::InvalidAttachments(format!(
                    "depth attachment at index {position} precedes color attachments"
                )));
            }
        }

        Ok(Self { attachments })
    }

    pub fn attachments(&self) -> &[AttachmentSpec] {
        &self.attachments
    }

    pub fn color_count(&self) -> usize {
        self.attachments
            .iter()
            .filter(|a| a.role == AttachmentRole::Color)
            .count()
    }

    pub fn depth(&self) -> Option<&AttachmentSpec> {
        self.attachments
            .last()
            .filter(|a| a.role == AttachmentRole::Depth)
    }

    pub fn build_render_pass(&self, device: Arc<Device>) -> VkResult<Arc<RenderPass>> {
        let attachments = self
            .attachments
            .iter()
            .map(|a| AttachmentDescription {
                format: a.format,
                load_op: a.load_op,
                store_op: a.store_op,
                initial_layout: ImageLayout::Undefined,
                final_layout: a.final_layout,
                ..Default::default()
            })
            .collect();

        let reference = |index: usize| {
            Some(AttachmentReference {
                attachment: index as u32,
                layout: self.attachments[index].subpass_layout(),
                ..Default::default()
            })
        };
        let color_attachments = (0..self.color_count()).map(reference).collect();
        let depth_stencil_attachment = self
            .depth()
            .and_then(|_| reference(self.attachments.len() - 1));

        RenderPass::new(
            device,
            RenderPassCreateInfo {
                attachments,
                subpasses: vec![SubpassDescription {
                    color_attachments,
                    depth_stencil_attachment,
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .vk_op("create render pass")
    }

    /// Records the final layouts on the textures bound to the framebuffer, in attachment order.
    pub fn record_final_layouts(&self, textures: &[&Texture]) -> VkResult<()> {
        if textures.len() != self.attachments.len() {
            return Err(VkError::InvalidAttachments(format!(
                "{} textures for {} attachments",
                textures.len(),
                self.attachments.len()
            )));
        }
        for (texture, attachment) in textures.iter().zip(&self.attachments) {
            // Every attachment starts out `Undefined`, the previous contents are not read.
            texture.discard_contents();
            texture.transition(attachment.final_layout)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_then_depth_is_accepted() {
        let set = AttachmentSet::new(vec![
            AttachmentSpec::color(Format::R16G16B16A16_SFLOAT),
            AttachmentSpec::color(Format::R8G8B8A8_UNORM),
            AttachmentSpec::depth(Format::D32_SFLOAT),
        ])
        .unwrap();

        assert_eq!(set.color_count(), 2);
        assert_eq!(set.depth().map(|d| d.format), Some(Format::D32_SFLOAT));
    }

    #[test]
    fn depth_only_is_accepted() {
        let set = AttachmentSet::new(vec![
            AttachmentSpec::depth(Format::D32_SFLOAT)
                .with_store_op(AttachmentStoreOp::Store)
                .with_final_layout(ImageLayout::ShaderReadOnlyOptimal),
        ])
        .unwrap();

        assert_eq!(set.color_count(), 0);
        assert_eq!(
            set.depth().map(|d| d.final_layout),
            Some(ImageLayout::ShaderReadOnlyOptimal)
        );
    }

    #[test]
    fn depth_before_color_is_rejected() {
        let err = AttachmentSet::new(vec![
            AttachmentSpec::depth(Format::D32_SFLOAT),
            AttachmentSpec::color(Format::R8G8B8A8_UNORM),
        ])
        .unwrap_err();
        assert!(matches!(err, VkError::InvalidAttachments(_)));
    }

    #[test]
    fn two_depth_attachments_are_rejected() {
        let err = AttachmentSet::new(vec![
            AttachmentSpec::color(Format::R8G8B8A8_UNORM),
            AttachmentSpec::depth(Format::D32_SFLOAT),
            AttachmentSpec::depth(Format::D16_UNORM),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("2 depth attachments"));
    }

    #[test]
    fn empty_set_is_rejected() {
        assert!(AttachmentSet::new(Vec::new()).is_err());
    }

    #[test]
    fn default_specs_match_the_gbuffer_contract() {
        let color = AttachmentSpec::color(Format::R8G8B8A8_UNORM);
        assert_eq!(color.final_layout, ImageLayout::ShaderReadOnlyOptimal);
        assert_eq!(color.store_op, AttachmentStoreOp::Store);

        let depth = AttachmentSpec::depth(Format::D32_SFLOAT);
        assert_eq!(depth.store_op, AttachmentStoreOp::DontCare);
        assert_eq!(depth.final_layout, ImageLayout::DepthStencilAttachmentOptimal);
    }
}
