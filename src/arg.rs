use std::path::PathBuf;

use clap::{
    App,
    Arg,
    ArgMatches,
};
use url::Url;

use crate::error::RequestError;

/// Runtime configuration of the server.
#[derive(Clone, Debug)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub root: PathBuf,
    pub server_uri: Url,
    pub multiuser: bool,
    pub workers: usize,
    pub data_browser: bool,
    pub data_browser_path: Option<PathBuf>,
    pub owner: Option<String>,
    pub webid_header: Option<String>,
    pub issuer: Option<Url>,
}

const BIND_HOST: &str  = "0.0.0.0";
const BIND_PORT: u16 = 8000;
const WORKERS: usize = 4;

fn default_uri(port: u16) -> Url {
    let s = format!("http://localhost:{}/", port);
    match Url::parse(&s) {
        Ok(v) => v,
        Err(_) => {
            panic!("default server uri {} is not a url", s);
        },
    }
}

impl Settings {

    pub fn new() -> Settings {
        Settings {
            host: BIND_HOST.to_string(),
            port: BIND_PORT,
            root: PathBuf::from("."),
            server_uri: default_uri(BIND_PORT),
            multiuser: false,
            workers: WORKERS,
            data_browser: true,
            data_browser_path: None,
            owner: None,
            webid_header: None,
            issuer: None,
        }
    }

    /// Settings for serving `root` under `server_uri`, everything else default.
    pub fn with_root(root: PathBuf, server_uri: Url) -> Settings {
        let mut settings = Settings::new();
        settings.root = root;
        settings.server_uri = server_uri;
        settings
    }

    /// The advertised OIDC issuer, the server itself unless configured.
    pub fn issuer(&self) -> &Url {
        match &self.issuer {
            Some(v) => v,
            None => &self.server_uri,
        }
    }

    fn bind_from_args(&mut self, arg: &ArgMatches) -> Result<(), RequestError> {
        match arg.value_of("host") {
            Some(v) => {
                self.host = v.to_string();
            },
            _ => {},
        };

        match arg.value_of("port") {
            Some(v) => {
                self.port = match u16::from_str_radix(&v, 10) {
                    Ok(port) => port,
                    Err(e) => {
                        return Err(RequestError::bad_request(&format!("invalid port {}: {}", v, e)));
                    },
                };
                self.server_uri = default_uri(self.port);
            },
            _ => {},
        };

        match arg.value_of("root") {
            Some(v) => {
                self.root = PathBuf::from(v);
            },
            _ => {},
        };

        match arg.value_of("server_uri") {
            Some(v) => {
                let mut s = v.to_string();
                if !s.ends_with('/') {
                    s.push('/');
                }
                self.server_uri = match Url::parse(&s) {
                    Ok(u) => u,
                    Err(e) => {
                        return Err(RequestError::bad_request(&format!("invalid server uri {}: {}", v, e)));
                    },
                };
            },
            _ => {},
        };

        match arg.value_of("workers") {
            Some(v) => {
                self.workers = match usize::from_str_radix(&v, 10) {
                    Ok(n) if n > 0 => n,
                    _ => {
                        return Err(RequestError::bad_request(&format!("invalid worker count {}", v)));
                    },
                };
            },
            _ => {},
        };

        match arg.value_of("issuer") {
            Some(v) => {
                self.issuer = match Url::parse(v) {
                    Ok(u) => Some(u),
                    Err(e) => {
                        return Err(RequestError::bad_request(&format!("invalid issuer {}: {}", v, e)));
                    },
                };
            },
            _ => {},
        };

        self.multiuser = arg.is_present("multiuser");
        self.data_browser = !arg.is_present("no_data_browser");
        self.data_browser_path = arg.value_of("data_browser_path").map(PathBuf::from);
        self.owner = arg.value_of("owner").map(|v| v.to_string());
        self.webid_header = arg.value_of("webid_header").map(|v| v.to_string());
        Ok(())
    }

    pub fn from_args() -> Result<Settings, RequestError> {
        let mut o = App::new("podd");
        o = o.version(env!("CARGO_PKG_VERSION"));
        o = o.about("Linked Data Platform server with Web Access Control");
        o = o.arg(
            Arg::with_name("host")
                .long("host")
                .short("h")
                .value_name("Host or ip to bind server to.")
                .takes_value(true)
                );
        o = o.arg(
            Arg::with_name("port")
                .long("port")
                .short("p")
                .value_name("Port to bind server to")
                .takes_value(true)
                );
        o = o.arg(
            Arg::with_name("root")
                .long("root")
                .short("r")
                .value_name("Directory to store resources in")
                .takes_value(true)
                );
        o = o.arg(
            Arg::with_name("server_uri")
                .long("server-uri")
                .short("u")
                .value_name("Public base uri of the server")
                .takes_value(true)
                );
        o = o.arg(
            Arg::with_name("workers")
                .long("workers")
                .short("w")
                .value_name("Number of request worker threads")
                .takes_value(true)
                );
        o = o.arg(
            Arg::with_name("multiuser")
                .long("multiuser")
                .help("Serve one storage tree per hostname")
                );
        o = o.arg(
            Arg::with_name("no_data_browser")
                .long("no-data-browser")
                .help("Never render RDF as html")
                );
        o = o.arg(
            Arg::with_name("data_browser_path")
                .long("data-browser-path")
                .value_name("Html file to serve as data browser")
                .takes_value(true)
                );
        o = o.arg(
            Arg::with_name("owner")
                .long("owner")
                .value_name("WebID to give control of the root container")
                .takes_value(true)
                );
        o = o.arg(
            Arg::with_name("webid_header")
                .long("webid-header")
                .value_name("Header carrying a WebID verified upstream")
                .takes_value(true)
                );
        o = o.arg(
            Arg::with_name("issuer")
                .long("issuer")
                .value_name("OIDC issuer to advertise")
                .takes_value(true)
                );

        let arg_matches = o.get_matches();
        let mut settings = Settings::new();
        settings.bind_from_args(&arg_matches)?;
        Ok(settings)
    }
}
