use std::collections::HashSet;

use serde::Deserialize;
use sweep_model::{Image, ImageId};

#[derive(Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    images: Vec<ImageEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageEntry {
    id: String,
    #[serde(default)]
    repo_tags: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct ContainersResponse {
    #[serde(default)]
    containers: Vec<ContainerEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerEntry {
    #[serde(default)]
    image_ref: String,
}

/// Decode `crictl images --output=json`.
pub(crate) fn images(raw: &[u8]) -> Result<Vec<Image>, serde_json::Error> {
    let resp: ImagesResponse = serde_json::from_slice(raw)?;
    Ok(resp
        .images
        .into_iter()
        .map(|e| Image::new(e.id, e.repo_tags.unwrap_or_default()))
        .collect())
}

/// Decode `crictl ps -a --output=json` into the set of referenced image ids.
pub(crate) fn images_in_use(raw: &[u8]) -> Result<HashSet<ImageId>, serde_json::Error> {
    let resp: ContainersResponse = serde_json::from_slice(raw)?;
    Ok(resp
        .containers
        .into_iter()
        .map(|c| c.image_ref)
        .filter(|r| !r.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_images() {
        let raw = br#"{
            "images": [
                {"id": "sha256:aaa", "repoTags": ["nginx:1.25", "nginx:latest"], "size": "1"},
                {"id": "sha256:bbb", "repoTags": null},
                {"id": "sha256:ccc"}
            ]
        }"#;

        let imgs = images(raw).unwrap();
        assert_eq!(imgs.len(), 3);
        assert_eq!(imgs[0].tags, ["nginx:1.25", "nginx:latest"]);
        assert!(imgs[1].tags.is_empty());
        assert!(imgs[2].is_dangling());
    }

    #[test]
    fn decode_containers_skips_empty_refs() {
        let raw = br#"{
            "containers": [
                {"id": "c1", "imageRef": "sha256:aaa", "state": "CONTAINER_RUNNING"},
                {"id": "c2", "imageRef": "sha256:aaa", "state": "CONTAINER_EXITED"},
                {"id": "c3", "imageRef": ""},
                {"id": "c4"}
            ]
        }"#;

        let used = images_in_use(raw).unwrap();
        assert_eq!(used.len(), 1);
        assert!(used.contains("sha256:aaa"));
    }

    #[test]
    fn empty_listing() {
        assert!(images(b"{}").unwrap().is_empty());
        assert!(images_in_use(br#"{"containers": []}"#).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(images(b"crictl: not json").is_err());
    }
}
