use crate::config::ImageConfigPlacement;
use crate::error::{GenerationError, Result};
use crate::models::{
    Content, GenerateContentRequest, GenerationConfig, GenerationRequest, GenerationSettings,
    ImageConfig, Part, RelayRequest,
};

/// Wraps the user's prompt so the model replies with an image part.
pub fn frame_prompt(prompt: &str) -> String {
    format!(
        "Generate an image of: {}\n\nRespond with the generated image itself, not a description of it.",
        prompt.trim()
    )
}

pub fn ensure_prompt(request: &GenerationRequest) -> Result<()> {
    if request.prompt.trim().is_empty() {
        return Err(GenerationError::MissingPrompt);
    }
    Ok(())
}

/// Builds the `generateContent` body. Reference images come first in upload
/// order and the framed prompt is always the last part.
pub fn build_provider_request(
    request: &GenerationRequest,
    placement: ImageConfigPlacement,
) -> Result<GenerateContentRequest> {
    ensure_prompt(request)?;

    let mut parts: Vec<Part> = request
        .reference_images
        .iter()
        .map(|image| Part::inline(image.mime_type.clone(), image.data.clone()))
        .collect();
    parts.push(Part::text(frame_prompt(&request.prompt)));

    let settings = &request.settings;
    let temperature = settings.effective_temperature();
    if temperature != settings.temperature {
        log::warn!(
            "Temperature {} out of range, using {}",
            settings.temperature,
            temperature
        );
    }

    let aspect_ratio = settings.aspect_ratio.provider_value().map(str::to_string);
    let image_size = Some(settings.resolution.as_str().to_string());

    let mut generation_config = GenerationConfig {
        temperature,
        response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
        image_config: None,
        aspect_ratio: None,
        image_size: None,
    };

    match placement {
        ImageConfigPlacement::Nested => {
            generation_config.image_config = Some(ImageConfig {
                aspect_ratio,
                image_size,
            });
        }
        ImageConfigPlacement::Flattened => {
            generation_config.aspect_ratio = aspect_ratio;
            generation_config.image_size = image_size;
        }
    }

    log::debug!(
        "Built request with {} reference image(s), settings {:?}",
        request.reference_images.len(),
        settings
    );

    Ok(GenerateContentRequest {
        contents: vec![Content { role: None, parts }],
        generation_config,
    })
}

/// Builds the same-origin relay body. The relay does its own framing.
pub fn build_relay_request(request: &GenerationRequest) -> Result<RelayRequest> {
    ensure_prompt(request)?;

    Ok(RelayRequest {
        prompt: request.prompt.clone(),
        reference_images_base64: request
            .reference_images
            .iter()
            .map(|image| image.to_data_url())
            .collect(),
        settings: GenerationSettings {
            temperature: request.settings.effective_temperature(),
            ..request.settings
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AspectRatio, EncodedImage, GenerationSettings, Resolution};
    use serde_json::{json, Value};

    fn body(request: &GenerationRequest, placement: ImageConfigPlacement) -> Value {
        serde_json::to_value(build_provider_request(request, placement).unwrap()).unwrap()
    }

    #[test]
    fn blank_prompt_fails_fast() {
        for prompt in ["", "   ", "\n\t"] {
            let request = GenerationRequest::new(prompt);
            assert_eq!(
                build_provider_request(&request, ImageConfigPlacement::Nested),
                Err(GenerationError::MissingPrompt)
            );
            assert_eq!(build_relay_request(&request), Err(GenerationError::MissingPrompt));
        }
    }

    #[test]
    fn images_precede_text_in_upload_order() {
        let request = GenerationRequest::new("a red fox").with_images(vec![
            EncodedImage::new("image/png", "AAA"),
            EncodedImage::new("image/jpeg", "BBB"),
        ]);

        let value = body(&request, ImageConfigPlacement::Nested);
        let parts = value["contents"][0]["parts"].as_array().unwrap();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], json!({ "inlineData": { "mimeType": "image/png", "data": "AAA" } }));
        assert_eq!(parts[1], json!({ "inlineData": { "mimeType": "image/jpeg", "data": "BBB" } }));
        let text = parts[2]["text"].as_str().unwrap();
        assert!(text.starts_with("Generate an image of: a red fox"));
    }

    #[test]
    fn auto_aspect_ratio_is_omitted() {
        for ratio in AspectRatio::ALL {
            let settings = GenerationSettings::new().with_aspect_ratio(ratio);
            let request = GenerationRequest::new("x").with_settings(settings);

            let nested = body(&request, ImageConfigPlacement::Nested);
            let flat = body(&request, ImageConfigPlacement::Flattened);
            let nested_ratio = nested["generationConfig"]["imageConfig"].get("aspectRatio");
            let flat_ratio = flat["generationConfig"].get("aspectRatio");

            if ratio == AspectRatio::Auto {
                assert!(nested_ratio.is_none());
                assert!(flat_ratio.is_none());
                assert!(!nested.to_string().contains("Auto"));
            } else {
                assert_eq!(nested_ratio, Some(&json!(ratio.as_str())));
                assert_eq!(flat_ratio, Some(&json!(ratio.as_str())));
            }
        }
    }

    #[test]
    fn maps_temperature_and_resolution() {
        let settings = GenerationSettings::new()
            .with_resolution(Resolution::TwoK)
            .with_temperature(0.5);
        let request = GenerationRequest::new("x").with_settings(settings);

        let nested = body(&request, ImageConfigPlacement::Nested);
        assert_eq!(nested["generationConfig"]["temperature"], json!(0.5));
        assert_eq!(nested["generationConfig"]["imageConfig"]["imageSize"], json!("2K"));
        assert!(nested["generationConfig"].get("imageSize").is_none());

        let flat = body(&request, ImageConfigPlacement::Flattened);
        assert_eq!(flat["generationConfig"]["imageSize"], json!("2K"));
        assert!(flat["generationConfig"].get("imageConfig").is_none());
    }

    #[test]
    fn clamps_temperature() {
        let request = GenerationRequest::new("x")
            .with_settings(GenerationSettings::new().with_temperature(3.0));
        let value = body(&request, ImageConfigPlacement::Nested);
        assert_eq!(value["generationConfig"]["temperature"], json!(1.0));
    }

    #[test]
    fn non_finite_temperature_falls_back_to_default() {
        for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let request = GenerationRequest::new("x")
                .with_settings(GenerationSettings::new().with_temperature(bad));

            let value = body(&request, ImageConfigPlacement::Nested);
            assert_eq!(value["generationConfig"]["temperature"], json!(1.0));

            let relay = serde_json::to_value(build_relay_request(&request).unwrap()).unwrap();
            assert_eq!(relay["settings"]["temperature"], json!(1.0));
        }
    }

    #[test]
    fn relay_body_carries_data_urls() {
        let request = GenerationRequest::new("x")
            .with_images(vec![EncodedImage::new("image/png", "QQ==")]);
        let relay = build_relay_request(&request).unwrap();
        assert_eq!(relay.reference_images_base64, vec!["data:image/png;base64,QQ==".to_string()]);
        assert_eq!(relay.prompt, "x");
    }
}
