use std::fs;
use std::process;
use std::sync::Arc;
use std::thread;

use tiny_http::Server;

use env_logger;

use log::{
    debug,
    error,
    info,
};

use podd::arg::Settings;
use podd::auth::wac::bootstrap_root_acl;
use podd::request::{
    Ldp,
    LdpRequest,
    RequestHeaders,
};
use podd::response::exec_response;

fn serve(srv: Arc<Server>, ldp: Arc<Ldp>) {
    loop {
        let mut req = match srv.recv() {
            Ok(v) => v,
            Err(e) => {
                error!("{}", e);
                break;
            },
        };
        let headers = RequestHeaders::from_request(&req);
        let method = req.method().clone();
        let url = req.url().to_string();
        let body_length = req.body_length();
        let res = ldp.handle(LdpRequest {
            method,
            url,
            headers,
            body: req.as_reader(),
            body_length,
        });
        exec_response(req, res);
    }
}

fn main() {
    env_logger::init();

    let settings = match Settings::from_args() {
        Ok(v) => v,
        Err(e) => {
            error!("{}", e);
            process::exit(2);
        },
    };

    match fs::create_dir_all(&settings.root) {
        Ok(_) => {},
        Err(e) => {
            error!("cannot use storage root {:?}: {}", settings.root, e);
            process::exit(1);
        },
    };

    let ldp = match Ldp::from_settings(settings) {
        Ok(v) => v,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        },
    };

    if let Some(owner) = &ldp.settings().owner {
        match bootstrap_root_acl(ldp.store(), &ldp.settings().server_uri, owner) {
            Ok(true) => {},
            Ok(false) => {
                debug!("root acl already present");
            },
            Err(e) => {
                error!("cannot create root acl: {}", e);
                process::exit(1);
            },
        };
    }

    let bind = format!("{}:{}", ldp.settings().host, ldp.settings().port);
    let srv = match Server::http(&bind) {
        Ok(v) => Arc::new(v),
        Err(e) => {
            error!("cannot bind {}: {}", bind, e);
            process::exit(1);
        },
    };
    info!("serving {:?} as {} on {}", ldp.settings().root, ldp.settings().server_uri, bind);

    let workers = ldp.settings().workers;
    let ldp = Arc::new(ldp);
    let mut handles = vec!();
    for i in 0..workers {
        let srv = Arc::clone(&srv);
        let ldp = Arc::clone(&ldp);
        let h = thread::Builder::new().name(format!("worker-{}", i)).spawn(move || serve(srv, ldp));
        match h {
            Ok(v) => handles.push(v),
            Err(e) => {
                error!("cannot start worker {}: {}", i, e);
                process::exit(1);
            },
        };
    }
    for h in handles {
        if h.join().is_err() {
            error!("worker panicked");
        }
    }
}
