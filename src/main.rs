use pingora::{listeners::tls::TlsSettings, server::configuration::Opt, server::Server, services::listening::Service};

use nsgate::{
    admin::AdminHttpApp,
    config::{Config, Tls},
    logging::{self, parse_level, LogLevels, Logger},
    service::build_gateway_app,
};

fn main() {
    // Read command-line arguments
    let opt = Opt::parse_args();

    // Load configuration with optional override
    let config = Config::load_yaml_with_opt_override(&opt).expect("Failed to load configuration");

    // Initialize logging
    let root = config
        .log
        .as_ref()
        .map_or(log::LevelFilter::Info, |log| parse_level(&log.level));
    let levels = LogLevels::new(root);
    let file_logger = config
        .log
        .as_ref()
        .and_then(|log| log.path.as_deref())
        .map(Logger::new);
    logging::init(levels.clone(), file_logger.as_ref()).expect("Failed to install logger");

    log::info!("Building gateway...");
    let app = build_gateway_app(&config, &levels).expect("Failed to initialize gateway");

    // Create Pingora server with optional configuration
    let mut nsgate_server = Server::new_with_opt_and_conf(Some(opt), config.pingora);

    let mut gateway_service = Service::new("nsgate".to_string(), app);

    // Add listeners from configuration
    log::info!("Adding listeners...");
    for list_cfg in config.listeners {
        match list_cfg.tls {
            Some(Tls {
                cert_path,
                key_path,
            }) => {
                let mut settings = TlsSettings::intermediate(&cert_path, &key_path)
                    .expect("Adding TLS listener shouldn't fail");
                if list_cfg.offer_h2 {
                    settings.enable_h2();
                }
                gateway_service.add_tls_with_settings(&list_cfg.address.to_string(), None, settings);
            }
            None => {
                gateway_service.add_tcp(&list_cfg.address.to_string());
            }
        }
    }

    // Bootstrapping and server startup
    log::info!("Bootstrapping...");
    nsgate_server.bootstrap();

    log::info!("Bootstrapped. Adding Services...");
    nsgate_server.add_service(gateway_service);

    if let Some(admin) = &config.admin {
        log::info!("Admin API listening on {}", admin.address);
        nsgate_server.add_service(AdminHttpApp::admin_http_service(admin, levels.clone()));
    }

    if let Some(file_logger) = file_logger {
        nsgate_server.add_service(file_logger);
    }

    log::info!("Starting Server...");
    nsgate_server.run_forever();
}
