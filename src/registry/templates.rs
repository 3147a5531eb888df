//! Fixed documents served for each virtual device

use std::fmt::Write;
use std::net::Ipv4Addr;

/// Static application catalogue `(id, name)` reported by `/query/apps`
pub const APPS: &[(&str, &str)] = &[
    ("11", "Roku Channel Store"),
    ("12", "Netflix"),
    ("13", "Amazon Video on Demand"),
    ("837", "YouTube"),
    ("2016", "Crackle"),
    ("3423", "Rdio"),
    ("21952", "Blockbuster"),
    ("31012", "MGO"),
    ("43594", "CinemaNow"),
    ("46041", "Sling TV"),
    ("50025", "GooglePlay"),
];

/// Build the discovery advertisement datagram for one device
#[must_use]
pub fn advertisement(uuid: &str, bind: Ipv4Addr, port: u16) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\n\
         Cache-Control: max-age=300\r\n\
         ST: roku:ecp\r\n\
         USN: uuid:roku:ecp:{uuid}\r\n\
         Ext: \r\n\
         Server: Roku UPnP/1.0 MiniUPnPd/1.4\r\n\
         LOCATION: http://{bind}:{port}/\r\n\
         \r\n"
    )
    .into_bytes()
}

/// Build the UPnP device descriptor served at `GET /`
#[must_use]
pub fn descriptor_xml(name: &str, uuid: &str) -> String {
    let name = escape_xml(name);
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" ?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion>
    <major>1</major>
    <minor>0</minor>
  </specVersion>
  <device>
    <deviceType>urn:roku-com:device:player:1-0</deviceType>
    <friendlyName>{name}</friendlyName>
    <manufacturer>Pmant</manufacturer>
    <manufacturerURL>https://github.com/Pmant/</manufacturerURL>
    <modelDescription>fakeroku ECP player</modelDescription>
    <modelName>{name}</modelName>
    <modelNumber>4200X</modelNumber>
    <modelURL>https://github.com/Pmant/ioBroker.fakeroku</modelURL>
    <serialNumber>{uuid}</serialNumber>
    <UDN>uuid:roku:ecp:{uuid}</UDN>
    <serviceList>
      <service>
        <serviceType>urn:roku-com:service:ecp:1</serviceType>
        <serviceId>urn:roku-com:serviceId:ecp1-0</serviceId>
        <controlURL/>
        <eventSubURL/>
        <SCPDURL>ecp_SCPD.xml</SCPDURL>
      </service>
    </serviceList>
  </device>
</root>"#
    )
}

/// Build the application list served at `GET /query/apps`
#[must_use]
pub fn apps_xml() -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n<apps>\n");
    for (id, name) in APPS {
        // Writing into a String cannot fail
        let _ = writeln!(xml, "  <app id=\"{id}\">{}</app>", escape_xml(name));
    }
    xml.push_str("</apps>");
    xml
}

/// Escape the five XML special characters
#[must_use]
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertisement_has_fixed_layout() {
        let ad = advertisement("abc123", Ipv4Addr::new(192, 168, 1, 5), 9093);
        let text = String::from_utf8(ad).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("ST: roku:ecp\r\n"));
        assert!(text.contains("USN: uuid:roku:ecp:abc123\r\n"));
        assert!(text.contains("LOCATION: http://192.168.1.5:9093/\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn descriptor_escapes_name() {
        let xml = descriptor_xml("Tom & Jerry's <TV>", "u1");
        assert!(xml.contains("<friendlyName>Tom &amp; Jerry&apos;s &lt;TV&gt;</friendlyName>"));
        assert!(xml.contains("<UDN>uuid:roku:ecp:u1</UDN>"));
    }

    #[test]
    fn apps_lists_every_entry() {
        let xml = apps_xml();
        for (id, name) in APPS {
            assert!(xml.contains(&format!("<app id=\"{id}\">{name}</app>")));
        }
        assert!(xml.ends_with("</apps>"));
    }
}
