//! Découpage d'URL et extraction de balises XML "à plat".
//!
//! Les routeurs domestiques renvoient un XML de qualité variable ; on se
//! contente donc d'une recherche de sous-chaînes : première balise trouvée,
//! sensible à la casse, sans gestion de l'imbrication. Toutes les fonctions
//! sont totales et ne paniquent jamais.

use std::net::Ipv4Addr;

/// Port HTTP implicite quand l'URL n'en donne pas.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Composants d'une URL `protocol://host:port/path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    pub host: String,
    pub port: u16,
    pub path: String,
}

fn strip_scheme(url: &str) -> &str {
    let url = url.trim();
    match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    }
}

fn authority(url: &str) -> &str {
    let rest = strip_scheme(url);
    match rest.find('/') {
        Some(idx) => &rest[..idx],
        None => rest,
    }
}

/// Découpe `url` en hôte, port et chemin.
pub fn parse_url(url: &str) -> Url {
    Url {
        host: url_host(url).to_string(),
        port: url_port(url),
        path: url_path(url).to_string(),
    }
}

/// Partie hôte, sans le port.
pub fn url_host(url: &str) -> &str {
    let authority = authority(url);
    match authority.find(':') {
        Some(idx) => &authority[..idx],
        None => authority,
    }
}

/// Hôte de l'URL s'il s'agit d'un littéral IPv4.
pub fn url_ipv4(url: &str) -> Option<Ipv4Addr> {
    url_host(url).parse().ok()
}

/// Port de l'URL : 80 s'il est absent, 0 s'il est illisible.
pub fn url_port(url: &str) -> u16 {
    let authority = authority(url);
    match authority.find(':') {
        Some(idx) => authority[idx + 1..].trim().parse().unwrap_or(0),
        None => DEFAULT_HTTP_PORT,
    }
}

/// Chemin à partir du premier `/` après l'hôte, ou `""`.
pub fn url_path(url: &str) -> &str {
    let rest = strip_scheme(url);
    match rest.find('/') {
        Some(idx) => &rest[idx..],
        None => "",
    }
}

/// Texte compris entre `<tag>` et le `</tag>` suivant dans `line`.
///
/// Retourne `""` si l'une des deux balises manque.
pub fn get_tag_content<'a>(line: &'a str, tag: &str) -> &'a str {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let Some(start) = line.find(&open) else {
        return "";
    };
    let content_start = start + open.len();
    match line[content_start..].find(&close) {
        Some(len) => &line[content_start..content_start + len],
        None => "",
    }
}
