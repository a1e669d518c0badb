//! Gallery listing and HTML rendering.

use crate::caption::Caption;
use crate::error::Result;
use crate::keys::{caption_key, is_image_key};
use crate::storage::{BlobEntry, BlobStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryItem {
    pub key: String,
    pub caption: Caption,
}

/// Keeps image entries only and orders them newest first.
pub fn newest_images_first(entries: Vec<BlobEntry>) -> Vec<BlobEntry> {
    let mut images: Vec<BlobEntry> = entries
        .into_iter()
        .filter(|entry| is_image_key(&entry.key))
        .collect();
    images.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.key.cmp(&b.key))
    });
    images
}

pub async fn list_images(store: &dyn BlobStore) -> Result<Vec<String>> {
    let entries = store.list().await?;
    Ok(newest_images_first(entries)
        .into_iter()
        .map(|entry| entry.key)
        .collect())
}

/// Reads the sidecar caption for `image_key`, or `N/A` if it is missing or unreadable.
pub async fn load_caption(store: &dyn BlobStore, image_key: &str) -> Caption {
    let key = caption_key(image_key);
    let data = match store.get(&key).await {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(image = image_key, caption = %key, error = %e, "caption unavailable");
            return Caption::not_available();
        }
    };
    match serde_json::from_slice(&data) {
        Ok(caption) => caption,
        Err(e) => {
            tracing::warn!(image = image_key, caption = %key, error = %e, "caption is not valid JSON");
            Caption::not_available()
        }
    }
}

pub async fn load_gallery(store: &dyn BlobStore) -> Result<Vec<GalleryItem>> {
    let mut items = Vec::new();
    for key in list_images(store).await? {
        let caption = load_caption(store, &key).await;
        items.push(GalleryItem { key, caption });
    }
    Ok(items)
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Image Gallery</title>
    <style>
        * {
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }

        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, sans-serif;
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
            min-height: 100vh;
            padding: 20px;
        }

        .container {
            background: white;
            border-radius: 20px;
            box-shadow: 0 20px 60px rgba(0,0,0,0.3);
            max-width: 960px;
            margin: 0 auto;
            padding: 40px;
        }

        h1 {
            color: #333;
            margin-bottom: 20px;
            font-size: 2em;
        }

        form {
            border: 3px dashed #667eea;
            border-radius: 15px;
            padding: 30px 20px;
            background: #f8f9ff;
            margin-bottom: 30px;
        }

        form div {
            margin-bottom: 10px;
        }

        button {
            background: #667eea;
            color: white;
            border: none;
            padding: 8px 20px;
            border-radius: 20px;
            font-weight: 600;
            cursor: pointer;
        }

        .gallery {
            list-style: none;
            display: grid;
            grid-template-columns: repeat(auto-fill, minmax(260px, 1fr));
            gap: 20px;
        }

        .gallery li {
            background: #f8f9ff;
            border-radius: 10px;
            padding: 15px;
            box-shadow: 0 4px 15px rgba(0,0,0,0.1);
        }

        .gallery img {
            width: 100%;
            height: 200px;
            object-fit: cover;
            border-radius: 10px;
        }

        .caption-title {
            color: #333;
            font-weight: 600;
            margin-top: 10px;
        }

        .caption-description {
            color: #666;
            font-size: 0.9em;
            line-height: 1.5;
            margin-top: 5px;
        }

        .empty {
            color: #999;
        }
    </style>
</head>
<body>
    <div class="container">
        <h1>Upload an Image</h1>
        <form method="post" enctype="multipart/form-data" action="/upload">
            <div>
                <label for="file">Choose file to upload</label>
                <input type="file" id="file" name="form_file" accept="image/jpeg,image/png"/>
            </div>
            <div>
                <button>Submit</button>
            </div>
        </form>
"#;

const PAGE_TAIL: &str = r#"    </div>
</body>
</html>
"#;

pub fn render_index(items: &[GalleryItem]) -> String {
    let mut html = String::from(PAGE_HEAD);

    if items.is_empty() {
        html.push_str("        <p class=\"empty\">No images uploaded yet.</p>\n");
    } else {
        html.push_str("        <ul class=\"gallery\">\n");
        for item in items {
            let name = escape_html(&urlencoding::encode(&item.key));
            html.push_str(&format!(
                "            <li>\n                <a href='/files/{name}'><img src='/files/{name}'></a>\n                <p class=\"caption-title\">{}</p>\n                <p class=\"caption-description\">{}</p>\n            </li>\n",
                escape_html(&item.caption.title),
                escape_html(&item.caption.description),
            ));
        }
        html.push_str("        </ul>\n");
    }

    html.push_str(PAGE_TAIL);
    html
}
