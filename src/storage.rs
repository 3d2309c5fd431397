/// Resolves stored image names to public URLs. Files themselves are written
/// and served by whatever sits behind `media_url`.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    media_url: String,
}

impl MediaStorage {
    pub fn new(media_url: &str) -> Self {
        let mut media_url = media_url.to_string();
        if !media_url.ends_with('/') {
            media_url.push('/');
        }
        MediaStorage { media_url }
    }

    pub fn url(&self, name: &str) -> String {
        format!("{}{}", self.media_url, name.trim_start_matches('/'))
    }

    /// Name under which the image of the article with `slug` is stored.
    #[cfg(test)]
    pub fn upload_name(slug: &str) -> String {
        format!("{}/{}.jpg", slug, slug)
    }
}
